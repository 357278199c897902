//! Service lifecycle state.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::mvi::State;

/// Lifecycle of the proxy service on this unit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ServiceState {
    /// The proxy package is not installed yet.
    #[default]
    Uninstalled,

    /// Installed but stopped by the operator.
    Disabled,

    /// Cannot make progress without outside action.
    ///
    /// `bound_port` is set when the daemon kept running from an earlier
    /// active period.
    Blocked {
        reason: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bound_port: Option<u16>,
    },

    /// A backend is related but no master is usable yet.
    Waiting {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bound_port: Option<u16>,
    },

    /// Serving clients on `listen_port`.
    Active { listen_port: u16 },
}

impl ServiceState {
    pub fn is_active(&self) -> bool {
        matches!(self, ServiceState::Active { .. })
    }

    /// Installed and not stopped by the operator.
    pub fn is_enabled(&self) -> bool {
        !matches!(self, ServiceState::Uninstalled | ServiceState::Disabled)
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self, ServiceState::Waiting { .. })
    }

    /// Port the daemon is bound to, if it is running.
    pub fn listen_port(&self) -> Option<u16> {
        match self {
            ServiceState::Active { listen_port } => Some(*listen_port),
            ServiceState::Waiting { bound_port } | ServiceState::Blocked { bound_port, .. } => {
                *bound_port
            }
            ServiceState::Uninstalled | ServiceState::Disabled => None,
        }
    }

    /// Status line for the operator.
    pub fn message(&self) -> String {
        match self {
            ServiceState::Uninstalled => "Not installed".to_string(),
            ServiceState::Disabled => "Disabled".to_string(),
            ServiceState::Blocked { reason, .. } => reason.clone(),
            ServiceState::Waiting { .. } => "Waiting for backend master".to_string(),
            ServiceState::Active { .. } => "Active".to_string(),
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServiceState::Uninstalled => "uninstalled",
            ServiceState::Disabled => "disabled",
            ServiceState::Blocked { .. } => "blocked",
            ServiceState::Waiting { .. } => "waiting",
            ServiceState::Active { .. } => "active",
        };
        f.write_str(name)
    }
}

impl State for ServiceState {}
