//! Service lifecycle as an explicit state machine.
//!
//! Every pass feeds the facts it observed to [`ServiceReducer`] as
//! [`ServiceIntent`]s. The daemon control action is then derived from the
//! state before and after, plus how the configuration changed, so the
//! decision lives in one place instead of being scattered over the pass.

mod intent;
mod mvi;
mod reducer;
mod state;

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::bouncer::ConfigChange;
use crate::files::{self, ArtifactError};

pub use intent::ServiceIntent;
pub use mvi::{Intent, Reducer, State};
pub use reducer::ServiceReducer;
pub use state::ServiceState;

/// What the process supervisor must do to the proxy daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DaemonAction {
    None,
    /// Start the daemon and enable it at boot.
    Resume,
    /// Stop the daemon and disable it at boot.
    Pause,
    Reload,
    Restart,
}

/// Derive the daemon action for a transition.
///
/// A daemon that is still running from an earlier active period (the
/// `before` state has a bound port) is reloaded or restarted, never
/// resumed.
pub fn daemon_action(before: &ServiceState, after: &ServiceState, change: ConfigChange) -> DaemonAction {
    match after {
        ServiceState::Active { listen_port } => match before.listen_port() {
            None => DaemonAction::Resume,
            Some(bound) if bound != *listen_port => DaemonAction::Restart,
            Some(_) => match change {
                ConfigChange::Unchanged => DaemonAction::None,
                ConfigChange::Reload => DaemonAction::Reload,
                ConfigChange::Restart => DaemonAction::Restart,
            },
        },
        ServiceState::Disabled if *before != ServiceState::Disabled => DaemonAction::Pause,
        _ => DaemonAction::None,
    }
}

/// The service state persisted between passes as JSON.
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored state, `Uninstalled` if nothing was stored yet.
    pub fn load(&self) -> Result<ServiceState, ArtifactError> {
        let Some(bytes) = files::read_optional(&self.path)? else {
            return Ok(ServiceState::default());
        };
        serde_json::from_slice(&bytes).map_err(|e| ArtifactError::Format {
            path: self.path.clone(),
            source: e,
        })
    }

    pub fn save(&self, state: &ServiceState) -> Result<(), ArtifactError> {
        let encoded = serde_json::to_vec_pretty(state).map_err(|e| ArtifactError::Format {
            path: self.path.clone(),
            source: e,
        })?;
        files::write_if_changed(&self.path, &encoded, 0o644)?;
        Ok(())
    }

    /// Apply one operator event outside of a pass and persist the result.
    pub fn dispatch(&self, intent: ServiceIntent) -> Result<(ServiceState, DaemonAction), ArtifactError> {
        let before = self.load()?;
        let after = ServiceReducer::reduce(before.clone(), intent);
        self.save(&after)?;
        Ok((
            after.clone(),
            daemon_action(&before, &after, ConfigChange::Unchanged),
        ))
    }
}
