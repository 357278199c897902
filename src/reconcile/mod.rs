//! One reconciliation pass, from peer state to side effects.
//!
//! A pass reads the peer directory, resolves the backend topology,
//! provisions clients on the master (leader only), publishes connection
//! details to every client relationship, regenerates the proxy
//! configuration and finally moves the service state machine. Passes are
//! not reentrant; the caller runs them one at a time.
//!
//! Unmet prerequisites (no backend, no master, no password from the leader
//! yet) end the affected stage early and are reported, not raised.

use std::collections::BTreeSet;

use serde::Serialize;
use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use crate::bouncer::{self, ConfigChange, ConfigReconciler, ProxyConfig};
use crate::config::{Config, ConfigError};
use crate::console;
use crate::credentials::{self, CredentialError, CredentialStore, LeaderSettings, SettingsFile};
use crate::files::{self, ArtifactError};
use crate::naming;
use crate::peers::{
    AdvertisementRecord, ClientRequest, DirectoryError, PeerDirectory, RelationId, RelationKind,
    SnapshotDirectory,
};
use crate::provision::{Connector, DbError, ProvisionOutcome, ProvisionRequest, Provisioner};
use crate::publish::{AdvertisementPublisher, ClientAdvertisement, OutboxFile, PublishError};
use crate::service::{
    daemon_action, DaemonAction, Reducer, ServiceIntent, ServiceReducer, ServiceState, StateFile,
};
use crate::topology::{self, Topology};

/// Errors that abort a pass.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Database(#[from] DbError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Publish(#[from] PublishError),
}

/// What was provisioned for one client relationship.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionSummary {
    pub relation: String,
    pub user: String,
    pub database: String,
    #[serde(flatten)]
    pub outcome: ProvisionOutcome,
}

/// A client relationship whose provisioning failed this pass.
#[derive(Debug, Clone, Serialize)]
pub struct FailedRelation {
    pub relation: String,
    pub error: String,
}

/// The decision of one pass, printed by the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    pub pass_id: String,
    pub state: ServiceState,
    pub message: String,
    pub action: DaemonAction,
    pub config_change: ConfigChange,
    pub userlist_changed: bool,
    pub master: Option<String>,
    pub standbys: Vec<String>,
    pub databases: Vec<String>,
    pub published: Vec<String>,
    /// Relations waiting for the leader to publish a password.
    pub deferred: Vec<String>,
    pub provisioned: Vec<ProvisionSummary>,
    /// Relations skipped because the master rejected their request.
    pub failed: Vec<FailedRelation>,
}

impl PassReport {
    fn new(pass_id: Uuid, state: ServiceState) -> Self {
        Self {
            pass_id: pass_id.to_string(),
            message: state.message(),
            state,
            action: DaemonAction::None,
            config_change: ConfigChange::Unchanged,
            userlist_changed: false,
            master: None,
            standbys: Vec::new(),
            databases: Vec::new(),
            published: Vec::new(),
            deferred: Vec::new(),
            provisioned: Vec::new(),
            failed: Vec::new(),
        }
    }

    fn record_topology(&mut self, topology: &Topology) {
        self.master = topology.master.as_ref().map(|m| m.unit.to_string());
        self.standbys = topology.standbys.iter().map(|s| s.unit.to_string()).collect();
    }
}

fn dispatch(state: ServiceState, intent: ServiceIntent) -> ServiceState {
    let next = ServiceReducer::reduce(state.clone(), intent.clone());
    if next != state {
        tracing::info!(from = %state, to = %next, intent = ?intent, "Service state changed");
    }
    next
}

/// Runs passes against one set of collaborators.
pub struct Reconciler<'a, D, S, P>
where
    D: PeerDirectory,
    S: LeaderSettings,
    P: AdvertisementPublisher,
{
    config: &'a Config,
    directory: &'a D,
    settings: &'a S,
    publisher: &'a P,
    connector: &'a dyn Connector,
    state_file: StateFile,
    proxy_config: ConfigReconciler,
}

impl<'a, D, S, P> Reconciler<'a, D, S, P>
where
    D: PeerDirectory,
    S: LeaderSettings,
    P: AdvertisementPublisher,
{
    pub fn new(
        config: &'a Config,
        directory: &'a D,
        settings: &'a S,
        publisher: &'a P,
        connector: &'a dyn Connector,
    ) -> Self {
        Self {
            config,
            directory,
            settings,
            publisher,
            connector,
            state_file: StateFile::new(&config.paths.state_file),
            proxy_config: ConfigReconciler::new(&config.paths.config_file),
        }
    }

    /// Run one full pass inside its own span.
    pub async fn run_pass(&self) -> Result<PassReport, ReconcileError> {
        let pass_id = Uuid::new_v4();
        let span = tracing::info_span!("pass", id = %pass_id, unit = %self.directory.local_unit());
        self.run(pass_id).instrument(span).await
    }

    async fn run(&self, pass_id: Uuid) -> Result<PassReport, ReconcileError> {
        self.config.validate()?;

        let before = self.state_file.load()?;
        let mut state = before.clone();
        if state == ServiceState::Uninstalled {
            state = dispatch(state, ServiceIntent::PackageInstalled);
        }
        let mut report = PassReport::new(pass_id, state.clone());

        let store = CredentialStore::new(self.settings, self.directory.is_leader());
        self.ensure_admin_passwords(&store)?;

        let mut change = ConfigChange::Unchanged;
        if state.is_enabled() {
            let (next, config_change) = self.converge(&store, state, &mut report).await?;
            state = next;
            change = config_change;
        } else {
            tracing::info!("Service disabled, skipping convergence");
        }

        // Late: clients served above may have created passwords.
        report.userlist_changed = self.sync_userlist(&store)?;
        if report.userlist_changed && change == ConfigChange::Unchanged {
            change = ConfigChange::Reload;
        }
        console::write_console_script(&self.config.paths.console_script, self.config.proxy.listen_port)?;

        report.action = daemon_action(&before, &state, change);
        report.config_change = change;
        report.message = state.message();
        self.state_file.save(&state)?;
        report.state = state;

        tracing::info!(
            state = %report.state,
            action = ?report.action,
            config_change = ?report.config_change,
            deferred = report.deferred.len(),
            failed = report.failed.len(),
            "Pass complete"
        );
        Ok(report)
    }

    /// Backend stages: topology, provisioning, publishing, configuration.
    async fn converge(
        &self,
        store: &CredentialStore<'_, S>,
        state: ServiceState,
        report: &mut PassReport,
    ) -> Result<(ServiceState, ConfigChange), ReconcileError> {
        let backends = self.backend_records();
        if backends.is_empty() {
            tracing::info!("No backend related");
            return Ok((dispatch(state, ServiceIntent::BackendDeparted), ConfigChange::Unchanged));
        }
        let mut state = dispatch(state, ServiceIntent::BackendJoined);

        let topology = topology::resolve(self.directory.local_unit(), &backends);
        report.record_topology(&topology);
        let Some(master) = topology.master.as_ref() else {
            tracing::info!(backends = backends.len(), "No master available yet");
            return Ok((dispatch(state, ServiceIntent::MasterLost), ConfigChange::Unchanged));
        };

        let listen_port = self.config.proxy.listen_port;
        if state.listen_port().is_some_and(|bound| bound != listen_port) {
            state = dispatch(state, ServiceIntent::PortChanged { listen_port });
        }

        let mut provisioner = if store.is_leader() {
            match Provisioner::connect(self.connector, master).await {
                Ok(provisioner) => Some(provisioner),
                Err(e) if e.is_connection() => {
                    tracing::warn!(master = %master.unit, error = %e, "Master unreachable");
                    return Ok((dispatch(state, ServiceIntent::MasterLost), ConfigChange::Unchanged));
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            None
        };

        let mut databases = BTreeSet::new();
        for kind in RelationKind::clients() {
            for relation in self.directory.relation_ids(*kind) {
                let served = self
                    .serve_client(*kind, &relation, store, master, provisioner.as_mut(), report)
                    .await;
                match served {
                    Ok(Some(database)) => {
                        databases.insert(database);
                    }
                    Ok(None) => {}
                    Err(ReconcileError::Database(e)) if e.is_connection() => {
                        tracing::warn!(master = %master.unit, error = %e, "Lost master mid-pass");
                        return Ok((dispatch(state, ServiceIntent::MasterLost), ConfigChange::Unchanged));
                    }
                    // The request is the client's to fix; other clients go on.
                    Err(ReconcileError::Database(e)) => {
                        tracing::warn!(relation = %relation, error = %e, "Provisioning failed, skipping relation");
                        report.failed.push(FailedRelation {
                            relation: relation.to_string(),
                            error: e.to_string(),
                        });
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        report.databases = databases.iter().cloned().collect();

        let stanzas = bouncer::synthesize(&topology, &databases);
        let proxy = ProxyConfig::from_config(self.config).with_databases(stanzas);
        let change = self.proxy_config.apply(&proxy)?;

        Ok((dispatch(state, ServiceIntent::MasterAvailable { listen_port }), change))
    }

    /// Every related backend unit, with or without a usable record.
    ///
    /// Units without a record still count toward cluster cardinality.
    fn backend_records(&self) -> Vec<AdvertisementRecord> {
        let mut records = Vec::new();
        for relation in self.directory.relation_ids(RelationKind::BackendDbAdmin) {
            for unit in self.directory.related_units(&relation) {
                let map = self.directory.read_record(&relation, &unit).unwrap_or_default();
                records.push(AdvertisementRecord::from_map(unit, &map));
            }
        }
        records
    }

    /// Provision and publish for one client relationship.
    ///
    /// Only the first client unit is read; all units of one client
    /// application converge on the same request. Returns the database the
    /// client uses, or `None` if the relationship was skipped.
    async fn serve_client(
        &self,
        kind: RelationKind,
        relation: &RelationId,
        store: &CredentialStore<'_, S>,
        master: &AdvertisementRecord,
        provisioner: Option<&mut Provisioner<'_>>,
        report: &mut PassReport,
    ) -> Result<Option<String>, ReconcileError> {
        let units = self.directory.related_units(relation);
        let Some((unit, map)) = units
            .iter()
            .find_map(|u| self.directory.read_record(relation, u).map(|m| (u, m)))
        else {
            return Ok(None);
        };
        let request = ClientRequest::from_map(unit.clone(), &map);
        let username = naming::username(relation, unit);

        let Some(password) = store.get_or_create(&username)? else {
            tracing::info!(relation = %relation, user = %username, "Leader has not published password yet");
            report.deferred.push(relation.to_string());
            return Ok(None);
        };
        let database = request
            .database
            .clone()
            .unwrap_or_else(|| naming::default_database(unit));

        if let Some(provisioner) = provisioner {
            let outcome = provisioner
                .provision(&ProvisionRequest {
                    username: &username,
                    password: &password,
                    database: &database,
                    roles: &request.roles,
                    extensions: &request.extensions,
                    admin: kind.is_admin(),
                })
                .await?;
            report.provisioned.push(ProvisionSummary {
                relation: relation.to_string(),
                user: username.clone(),
                database: database.clone(),
                outcome,
            });
        }

        let advertisement = ClientAdvertisement {
            host: &self.config.proxy.listen_addr,
            port: self.config.proxy.listen_port,
            database: &database,
            user: &username,
            password: &password,
            roles: &request.roles,
            is_leader: store.is_leader(),
            allowed_units: &units,
            version: master.version.as_deref(),
        };
        self.publisher.publish(relation, advertisement.to_record())?;
        tracing::debug!(relation = %relation, kind = %kind, database = %database, "Published connection details");
        report.published.push(relation.to_string());

        Ok(Some(database))
    }

    /// Make sure every administrative user has a password and `.pgpass`.
    fn ensure_admin_passwords(&self, store: &CredentialStore<'_, S>) -> Result<(), ReconcileError> {
        for user in &self.config.admin_users {
            let Some(password) = store.get_or_create(&user.name)? else {
                continue;
            };
            credentials::write_pgpass(user, &password)?;
        }
        Ok(())
    }

    /// Mirror the replicated userlist into the daemon's auth file.
    fn sync_userlist(&self, store: &CredentialStore<'_, S>) -> Result<bool, ReconcileError> {
        let text = store.raw_userlist()?.unwrap_or_default();
        let path = &self.config.paths.userlist_file;
        let changed = files::write_if_changed(path, text.as_bytes(), 0o400)?;
        if changed {
            tracing::info!(path = %path.display(), "Updated userlist");
        }
        Ok(changed)
    }
}

/// Run one pass against the file-backed store contract named in `[store]`.
pub async fn run_with_store_files(
    config: &Config,
    connector: &dyn Connector,
) -> Result<PassReport, ReconcileError> {
    let directory = SnapshotDirectory::load(&config.store.snapshot)?;
    let settings = SettingsFile::new(&config.store.leader_settings);
    let outbox = OutboxFile::new(&config.store.outbox);
    Reconciler::new(config, &directory, &settings, &outbox, connector)
        .run_pass()
        .await
}
