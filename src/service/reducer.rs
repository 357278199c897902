//! Reducer for the service lifecycle.

use super::intent::ServiceIntent;
use super::mvi::Reducer;
use super::state::ServiceState;

const BACKEND_REQUIRED: &str = "Backend relation required";

fn blocked(bound_port: Option<u16>) -> ServiceState {
    ServiceState::Blocked {
        reason: BACKEND_REQUIRED.to_string(),
        bound_port,
    }
}

/// Pure transition function; daemon control is derived by the caller from
/// the before/after pair.
///
/// Leaving `Active` for `Waiting` or `Blocked` does not stop the daemon, so
/// those states carry the port it is still bound to.
pub struct ServiceReducer;

impl Reducer for ServiceReducer {
    type State = ServiceState;
    type Intent = ServiceIntent;

    fn reduce(state: Self::State, intent: Self::Intent) -> Self::State {
        match intent {
            ServiceIntent::PackageInstalled => match state {
                ServiceState::Uninstalled | ServiceState::Disabled => blocked(None),
                other => other,
            },

            ServiceIntent::Stopped => match state {
                ServiceState::Uninstalled => ServiceState::Uninstalled,
                _ => ServiceState::Disabled,
            },

            // Nothing moves an uninstalled or stopped service except the
            // events above.
            _ if !state.is_enabled() => state,

            ServiceIntent::BackendJoined => match state {
                ServiceState::Blocked { bound_port, .. } => ServiceState::Waiting { bound_port },
                other => other,
            },

            ServiceIntent::BackendDeparted => blocked(state.listen_port()),

            ServiceIntent::MasterAvailable { listen_port } => match state {
                ServiceState::Waiting { .. } | ServiceState::Active { .. } => {
                    ServiceState::Active { listen_port }
                }
                other => other,
            },

            ServiceIntent::MasterLost => match state {
                ServiceState::Active { listen_port } => ServiceState::Waiting {
                    bound_port: Some(listen_port),
                },
                other => other,
            },

            ServiceIntent::PortChanged { listen_port } => match state {
                ServiceState::Active { .. } => ServiceState::Active { listen_port },
                other => other,
            },
        }
    }
}
