//! Read-only view over the distributed configuration store.
//!
//! Peers publish flat key/value advertisement records per relationship.
//! A pass reads them through [`PeerDirectory`]; nothing here writes.

mod record;
mod snapshot;

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use record::{AdvertisementRecord, BackendRole, ClientRequest, Endpoint};
pub use snapshot::{DirectoryError, SnapshotDirectory};

/// A peer's published key/value record.
pub type RecordMap = BTreeMap<String, String>;

/// Kind of logical relationship between this proxy and its peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RelationKind {
    /// Administrative link to the PostgreSQL backend.
    BackendDbAdmin,
    /// Regular client link.
    Db,
    /// Client link granting superuser access.
    DbAdmin,
}

impl RelationKind {
    /// Stable name used as the key in the store.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BackendDbAdmin => "backend-db-admin",
            Self::Db => "db",
            Self::DbAdmin => "db-admin",
        }
    }

    /// Client relationship kinds, in processing order.
    pub fn clients() -> &'static [RelationKind] {
        &[Self::Db, Self::DbAdmin]
    }

    /// Whether clients on this relationship are provisioned as superusers.
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::DbAdmin)
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of one relationship instance, e.g. `db:12`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationId(String);

impl RelationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A unit identifier of the form `<application>/<index>`.
///
/// Ordering compares the application name, then the numeric index, so
/// `pg/2` sorts before `pg/10`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitName(String);

impl UnitName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The application part, i.e. everything before the first `/`.
    pub fn application(&self) -> &str {
        self.0.split('/').next().unwrap_or(&self.0)
    }

    fn index(&self) -> Option<u64> {
        self.0.split_once('/').and_then(|(_, n)| n.parse().ok())
    }
}

impl Ord for UnitName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.application()
            .cmp(other.application())
            .then_with(|| self.index().cmp(&other.index()))
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for UnitName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for UnitName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Read contract of the distributed configuration store.
pub trait PeerDirectory {
    /// This unit's own identity.
    fn local_unit(&self) -> &UnitName;

    /// Whether this unit is the elected leader of its peer group.
    fn is_leader(&self) -> bool;

    /// Relationship ids of the given kind, sorted.
    fn relation_ids(&self, kind: RelationKind) -> Vec<RelationId>;

    /// Remote units currently joined to a relationship, sorted.
    fn related_units(&self, id: &RelationId) -> Vec<UnitName>;

    /// The record a remote unit published on a relationship.
    fn read_record(&self, id: &RelationId, unit: &UnitName) -> Option<RecordMap>;
}
