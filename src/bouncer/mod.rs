//! PgBouncer configuration synthesis and change classification.
//!
//! The configuration is regenerated wholesale on every pass from the
//! resolved topology and the requested databases, never patched, so no
//! stanza can survive from an older topology. The new bytes are compared
//! with the file on disk to decide between doing nothing, a reload, and a
//! full restart.

mod render;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::Config;
use crate::connstr::ConnectionString;
use crate::files::{self, ArtifactError};
use crate::peers::AdvertisementRecord;
use crate::topology::Topology;

pub use render::listen_settings;

/// Suffix of the stanza routing to the standby.
pub const STANDBY_SUFFIX: &str = "_standby";

/// Rendered proxy configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Stanza name -> upstream connection descriptor.
    pub databases: BTreeMap<String, String>,
    pub listen_addr: String,
    pub listen_port: u16,
    pub auth_type: String,
    pub auth_file: PathBuf,
    pub admin_users: Vec<String>,
    pub pool_mode: String,
    pub max_client_conn: u32,
    pub default_pool_size: u32,
    pub unix_socket_dir: PathBuf,
    pub logfile: PathBuf,
    pub pidfile: PathBuf,
}

impl ProxyConfig {
    /// Proxy configuration with no database stanzas.
    pub fn from_config(config: &Config) -> Self {
        Self {
            databases: BTreeMap::new(),
            listen_addr: config.proxy.listen_addr.clone(),
            listen_port: config.proxy.listen_port,
            auth_type: config.proxy.auth_type.clone(),
            auth_file: config.paths.userlist_file.clone(),
            admin_users: config.admin_user_names(),
            pool_mode: config.proxy.pool_mode.clone(),
            max_client_conn: config.proxy.max_client_conn,
            default_pool_size: config.proxy.default_pool_size,
            unix_socket_dir: config.paths.unix_socket_dir.clone(),
            logfile: config.paths.logfile.clone(),
            pidfile: config.paths.pidfile.clone(),
        }
    }

    pub fn with_databases(mut self, databases: BTreeMap<String, String>) -> Self {
        self.databases = databases;
        self
    }

    pub fn render(&self) -> String {
        render::render(self)
    }
}

/// Upstream descriptor for one backend: no credentials, forced database.
///
/// PgBouncer passes the client's own user and password through.
pub fn descriptor(backend: &AdvertisementRecord, dbname: &str) -> Option<String> {
    let endpoint = backend.endpoint()?;
    Some(
        ConnectionString::to_endpoint(&endpoint)
            .dbname(dbname)
            .to_string(),
    )
}

/// Database stanzas for every requested database.
///
/// The master gets `dbname`; the first standby, if any, gets
/// `dbname_standby`. Only one standby is exposed.
pub fn synthesize(topology: &Topology, databases: &BTreeSet<String>) -> BTreeMap<String, String> {
    let mut stanzas = BTreeMap::new();
    for dbname in databases {
        if let Some(master) = &topology.master {
            if let Some(desc) = descriptor(master, dbname) {
                stanzas.insert(dbname.clone(), desc);
            }
        }
        if let Some(standby) = topology.primary_standby() {
            if let Some(desc) = descriptor(standby, dbname) {
                stanzas.insert(format!("{dbname}{STANDBY_SUFFIX}"), desc);
            }
        }
    }
    stanzas
}

/// What the daemon has to do to pick up a new configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigChange {
    Unchanged,
    /// Routing changed; a reload is enough.
    Reload,
    /// The bound address changed; connections will drop.
    Restart,
}

/// Compare freshly rendered bytes with the previous artifact.
///
/// A missing previous artifact means the daemon never bound with this
/// configuration, which needs a restart.
pub fn classify(previous: Option<&str>, rendered: &str) -> ConfigChange {
    let Some(previous) = previous else {
        return ConfigChange::Restart;
    };
    if previous == rendered {
        return ConfigChange::Unchanged;
    }
    if listen_settings(previous) != listen_settings(rendered) {
        ConfigChange::Restart
    } else {
        ConfigChange::Reload
    }
}

/// Owns the configuration file on disk.
#[derive(Debug, Clone)]
pub struct ConfigReconciler {
    path: PathBuf,
}

impl ConfigReconciler {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Render, classify against the file on disk, write if different.
    pub fn apply(&self, config: &ProxyConfig) -> Result<ConfigChange, ArtifactError> {
        let rendered = config.render();
        let previous = files::read_optional(&self.path)?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned());
        let change = classify(previous.as_deref(), &rendered);

        if change != ConfigChange::Unchanged {
            tracing::info!(path = %self.path.display(), change = ?change, "Updating proxy configuration");
            files::write_atomic(&self.path, rendered.as_bytes(), 0o644)?;
        }
        Ok(change)
    }
}
