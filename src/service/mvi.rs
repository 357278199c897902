//! Unidirectional state primitives.
//!
//! ```text
//! Intent ──→ Reducer ──→ State ──→ side effects (caller)
//! ```

/// Marker trait for events fed to a reducer.
pub trait Intent: Send + 'static {}

/// Marker trait for reducer state.
///
/// States are plain values: cloned to derive new ones, compared to detect
/// transitions.
pub trait State: Clone + PartialEq + Default + Send + 'static {}

/// The only place state transitions happen.
///
/// `reduce` must be pure: `(State, Intent) -> State`.
pub trait Reducer {
    type State: State;

    type Intent: Intent;

    fn reduce(state: Self::State, intent: Self::Intent) -> Self::State;
}
