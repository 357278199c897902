//! File-backed snapshot of the peer directory.
//!
//! The distributed store delivers peer state as one JSON document:
//!
//! ```text
//! {
//!   "local_unit": "pgbouncer/0",
//!   "is_leader": true,
//!   "relations": {
//!     "backend-db-admin": { "backend-db-admin:1": { "postgresql/0": { "host": "..." } } },
//!     "db": { "db:2": { "psql/0": { "database": "appdb" } } }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{PeerDirectory, RecordMap, RelationId, RelationKind, UnitName};

/// Errors that can occur when loading a peer snapshot.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Failed to read peer snapshot '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse peer snapshot '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

type Units = BTreeMap<UnitName, RecordMap>;

/// Point-in-time view of every relationship this unit participates in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotDirectory {
    local_unit: UnitName,
    #[serde(default)]
    is_leader: bool,
    /// kind -> relation id -> unit -> record
    #[serde(default)]
    relations: BTreeMap<String, BTreeMap<RelationId, Units>>,
}

impl SnapshotDirectory {
    pub fn new(local_unit: UnitName, is_leader: bool) -> Self {
        Self {
            local_unit,
            is_leader,
            relations: BTreeMap::new(),
        }
    }

    /// Load a snapshot document from disk.
    pub fn load(path: &Path) -> Result<Self, DirectoryError> {
        let content = fs::read_to_string(path).map_err(|e| DirectoryError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| DirectoryError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Join a unit to a relationship, with an empty record if none given.
    pub fn join(&mut self, kind: RelationKind, id: &RelationId, unit: &UnitName) {
        self.units_mut(kind, id).entry(unit.clone()).or_default();
    }

    /// Replace the record a unit publishes on a relationship.
    pub fn set_record(
        &mut self,
        kind: RelationKind,
        id: &RelationId,
        unit: &UnitName,
        record: RecordMap,
    ) {
        self.units_mut(kind, id).insert(unit.clone(), record);
    }

    /// Remove a unit from a relationship.
    pub fn depart(&mut self, kind: RelationKind, id: &RelationId, unit: &UnitName) {
        self.units_mut(kind, id).remove(unit);
    }

    pub fn set_leader(&mut self, is_leader: bool) {
        self.is_leader = is_leader;
    }

    fn units_mut(&mut self, kind: RelationKind, id: &RelationId) -> &mut Units {
        self.relations
            .entry(kind.as_str().to_string())
            .or_default()
            .entry(id.clone())
            .or_default()
    }

    fn units(&self, id: &RelationId) -> Option<&Units> {
        self.relations.values().find_map(|ids| ids.get(id))
    }
}

impl PeerDirectory for SnapshotDirectory {
    fn local_unit(&self) -> &UnitName {
        &self.local_unit
    }

    fn is_leader(&self) -> bool {
        self.is_leader
    }

    fn relation_ids(&self, kind: RelationKind) -> Vec<RelationId> {
        self.relations
            .get(kind.as_str())
            .map(|ids| ids.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn related_units(&self, id: &RelationId) -> Vec<UnitName> {
        self.units(id)
            .map(|units| units.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn read_record(&self, id: &RelationId, unit: &UnitName) -> Option<RecordMap> {
        self.units(id).and_then(|units| units.get(unit)).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_document() {
        let json = r#"{
            "local_unit": "pgbouncer/0",
            "is_leader": true,
            "relations": {
                "backend-db-admin": {
                    "backend-db-admin:1": {
                        "postgresql/0": {"host": "10.0.0.5", "state": "standalone"}
                    }
                },
                "db": {"db:2": {"psql/1": {}, "psql/0": {"database": "appdb"}}}
            }
        }"#;
        let dir: SnapshotDirectory = serde_json::from_str(json).unwrap();

        assert_eq!(dir.local_unit().as_str(), "pgbouncer/0");
        assert!(dir.is_leader());
        let ids = dir.relation_ids(RelationKind::Db);
        assert_eq!(ids, vec![RelationId::new("db:2")]);
        let units = dir.related_units(&ids[0]);
        assert_eq!(units[0].as_str(), "psql/0");
        let record = dir.read_record(&ids[0], &units[0]).unwrap();
        assert_eq!(record.get("database").map(String::as_str), Some("appdb"));
        assert!(dir.relation_ids(RelationKind::DbAdmin).is_empty());
    }

    #[test]
    fn depart_removes_unit() {
        let mut dir = SnapshotDirectory::new(UnitName::new("pgbouncer/0"), false);
        let id = RelationId::new("db:1");
        let unit = UnitName::new("psql/0");
        dir.join(RelationKind::Db, &id, &unit);
        assert_eq!(dir.related_units(&id).len(), 1);
        dir.depart(RelationKind::Db, &id, &unit);
        assert!(dir.related_units(&id).is_empty());
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = SnapshotDirectory::load(Path::new("/nonexistent/peers.json")).unwrap_err();
        assert!(matches!(err, DirectoryError::Read { .. }));
    }
}
