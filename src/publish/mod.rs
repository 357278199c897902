//! Outgoing advertisement records for client relationships.
//!
//! Each pass replaces this unit's whole record on a relationship; fields
//! are never patched individually.

mod outbox;

use std::collections::BTreeSet;

use thiserror::Error;

use crate::bouncer::STANDBY_SUFFIX;
use crate::connstr::ConnectionString;
use crate::credentials::SecureString;
use crate::peers::{RecordMap, RelationId, UnitName};

pub use outbox::{MemoryOutbox, OutboxFile};

/// Errors from the outgoing record store.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Failed to access outbox '{path}': {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Outbox '{path}' is not valid JSON: {source}")]
    Format {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Write contract of the distributed configuration store.
pub trait AdvertisementPublisher {
    /// Replace this unit's record on `relation` with `record`.
    fn publish(&self, relation: &RelationId, record: RecordMap) -> Result<(), PublishError>;
}

/// Connection details handed to one client relationship.
#[derive(Debug, Clone)]
pub struct ClientAdvertisement<'a> {
    /// Address clients reach the proxy on.
    pub host: &'a str,
    pub port: u16,
    pub database: &'a str,
    pub user: &'a str,
    pub password: &'a SecureString,
    pub roles: &'a BTreeSet<String>,
    /// Whether this proxy unit is the leader of its peer group.
    pub is_leader: bool,
    /// Every client unit on the relationship.
    pub allowed_units: &'a [UnitName],
    /// Backend server version, passed through.
    pub version: Option<&'a str>,
}

impl ClientAdvertisement<'_> {
    fn connection_string(&self, dbname: &str) -> String {
        ConnectionString::new()
            .host(self.host)
            .port(self.port)
            .dbname(dbname)
            .user(self.user)
            .password(self.password.expose())
            .to_string()
    }

    /// The full outgoing record.
    ///
    /// Carries both the discrete fields and the prebuilt `master` and
    /// `standbys` connection strings for newer clients.
    pub fn to_record(&self) -> RecordMap {
        let mut record = RecordMap::new();
        record.insert("host".into(), self.host.to_string());
        record.insert("database".into(), self.database.to_string());
        record.insert("port".into(), self.port.to_string());
        record.insert("user".into(), self.user.to_string());
        record.insert("password".into(), self.password.expose().to_string());
        record.insert(
            "roles".into(),
            self.roles.iter().cloned().collect::<Vec<_>>().join(","),
        );
        let state = if self.is_leader { "master" } else { "standby" };
        record.insert("state".into(), state.to_string());

        let mut units: Vec<&str> = self.allowed_units.iter().map(UnitName::as_str).collect();
        units.sort_unstable();
        units.dedup();
        record.insert("allowed-units".into(), units.join(" "));

        if let Some(version) = self.version {
            record.insert("version".into(), version.to_string());
        }

        record.insert("master".into(), self.connection_string(self.database));
        // Only one standby endpoint is exposed.
        record.insert(
            "standbys".into(),
            self.connection_string(&format!("{}{STANDBY_SUFFIX}", self.database)),
        );
        record
    }
}
