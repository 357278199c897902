//! Shared test utilities and fake infrastructure.

#![allow(dead_code, unused_imports)]

pub mod fake_postgres;

use std::path::PathBuf;

use poolctl::config::{AdminUser, Config, Paths, StoreSettings};
use poolctl::credentials::MemorySettings;
use poolctl::peers::{RecordMap, RelationId, RelationKind, SnapshotDirectory, UnitName};
use poolctl::publish::MemoryOutbox;
use poolctl::reconcile::{PassReport, Reconciler};
use tempfile::TempDir;

pub use fake_postgres::{Cluster, FakePostgres, Role};

pub const BACKEND_RELATION: &str = "backend-db-admin:1";

/// Build a record map from key/value pairs.
pub fn record(pairs: &[(&str, &str)]) -> RecordMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Config whose every artifact lives under `dir`.
pub fn temp_paths_config(dir: &TempDir) -> Config {
    let root = dir.path();
    Config {
        paths: Paths {
            config_file: root.join("etc/pgbouncer.ini"),
            userlist_file: root.join("etc/userlist.txt"),
            console_script: root.join("bin/pgbouncer-cli"),
            state_file: root.join("lib/state.json"),
            ..Paths::default()
        },
        store: StoreSettings {
            snapshot: root.join("lib/peers.json"),
            leader_settings: root.join("lib/leader.json"),
            outbox: root.join("lib/outbox.json"),
        },
        admin_users: Vec::new(),
        ..Config::default()
    }
}

/// One proxy unit with in-memory collaborators and a fake backend.
pub struct Harness {
    pub dir: TempDir,
    pub config: Config,
    pub directory: SnapshotDirectory,
    pub settings: MemorySettings,
    pub outbox: MemoryOutbox,
    pub postgres: FakePostgres,
}

impl Harness {
    pub fn leader() -> Self {
        Self::new("pgbouncer/0", true, MemorySettings::new(), FakePostgres::new())
    }

    /// A unit sharing replicated settings and the backend with others.
    pub fn new(unit: &str, is_leader: bool, settings: MemorySettings, postgres: FakePostgres) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let config = temp_paths_config(&dir);
        Self {
            dir,
            config,
            directory: SnapshotDirectory::new(UnitName::new(unit), is_leader),
            settings,
            outbox: MemoryOutbox::new(),
            postgres,
        }
    }

    /// Advertise a backend unit on the admin relationship.
    pub fn backend(&mut self, unit: &str, host: &str, state: &str, allowed: &[&str]) {
        let allowed = allowed.join(" ");
        self.directory.set_record(
            RelationKind::BackendDbAdmin,
            &RelationId::new(BACKEND_RELATION),
            &UnitName::new(unit),
            record(&[
                ("host", host),
                ("port", "5432"),
                ("state", state),
                ("allowed-units", &allowed),
                ("user", "admin"),
                ("password", "adminpw"),
                ("version", "9.5"),
            ]),
        );
    }

    pub fn depart_backend(&mut self, unit: &str) {
        self.directory.depart(
            RelationKind::BackendDbAdmin,
            &RelationId::new(BACKEND_RELATION),
            &UnitName::new(unit),
        );
    }

    /// Publish a client request on a relationship.
    pub fn client(&mut self, kind: RelationKind, relation: &str, unit: &str, pairs: &[(&str, &str)]) {
        self.directory.set_record(
            kind,
            &RelationId::new(relation),
            &UnitName::new(unit),
            record(pairs),
        );
    }

    pub async fn pass(&self) -> PassReport {
        Reconciler::new(
            &self.config,
            &self.directory,
            &self.settings,
            &self.outbox,
            &self.postgres,
        )
        .run_pass()
        .await
        .expect("pass failed")
    }

    pub fn proxy_config(&self) -> String {
        std::fs::read_to_string(&self.config.paths.config_file).expect("config not written")
    }

    pub fn published(&self, relation: &str) -> Option<RecordMap> {
        self.outbox.get(&RelationId::new(relation))
    }

    pub fn admin_home(&self, name: &str) -> AdminUser {
        let home: PathBuf = self.dir.path().join("home").join(name);
        std::fs::create_dir_all(&home).expect("Failed to create home");
        AdminUser {
            name: name.to_string(),
            home,
        }
    }
}
