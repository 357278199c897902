//! Events driving the service lifecycle.

use super::mvi::Intent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceIntent {
    /// The proxy package is present and the service should run.
    PackageInstalled,

    /// The operator stopped the service.
    Stopped,

    /// At least one backend unit is related.
    BackendJoined,

    /// No backend unit is related any more.
    BackendDeparted,

    /// A master was resolved and is reachable.
    MasterAvailable { listen_port: u16 },

    /// No master resolved, or it became unreachable.
    MasterLost,

    /// The configured listen port differs from the bound one.
    PortChanged { listen_port: u16 },
}

impl Intent for ServiceIntent {}
