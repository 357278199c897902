//! Idempotent provisioning of users, roles, databases and extensions.
//!
//! Only the elected leader provisions. Every step checks for the object
//! first and tolerates losing a create race to another actor, so a step
//! can be repeated on every pass and converges instead of failing.

pub mod ident;
mod postgres;
pub mod sql;

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::credentials::SecureString;
use crate::peers::AdvertisementRecord;

pub use postgres::{PgConnector, PgDatabase};

/// Database the admin connection is opened against.
pub const ADMIN_DATABASE: &str = "postgres";

/// Errors from the backend database.
#[derive(Debug, Clone, Error)]
pub enum DbError {
    /// The backend is unreachable or dropped the connection.
    #[error("Cannot reach database '{database}': {message}")]
    Connection { database: String, message: String },

    /// Another actor created the object first.
    #[error("Object already exists: {0}")]
    Duplicate(String),

    #[error("Query failed: {0}")]
    Query(String),
}

impl DbError {
    pub fn is_connection(&self) -> bool {
        matches!(self, DbError::Connection { .. })
    }
}

/// Operations the provisioner needs from a backend connection.
///
/// Each call is one autocommitted round trip.
#[async_trait]
pub trait BackendDatabase: Send {
    async fn database_exists(&mut self, name: &str) -> Result<bool, DbError>;

    async fn create_database(&mut self, name: &str) -> Result<(), DbError>;

    async fn grant_connect(&mut self, database: &str, user: &str) -> Result<(), DbError>;

    async fn role_exists(&mut self, name: &str) -> Result<bool, DbError>;

    async fn create_login_role(
        &mut self,
        name: &str,
        password: &SecureString,
        superuser: bool,
    ) -> Result<(), DbError>;

    async fn create_group_role(&mut self, name: &str) -> Result<(), DbError>;

    /// Roles the user is currently a member of.
    async fn role_memberships(&mut self, user: &str) -> Result<BTreeSet<String>, DbError>;

    async fn grant_role(&mut self, role: &str, user: &str) -> Result<(), DbError>;

    async fn revoke_role(&mut self, role: &str, user: &str) -> Result<(), DbError>;

    /// `CREATE EXTENSION IF NOT EXISTS` in the connected database.
    async fn create_extension(&mut self, name: &str) -> Result<(), DbError>;
}

/// Opens connections to the elected master.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        master: &AdvertisementRecord,
        database: &str,
    ) -> Result<Box<dyn BackendDatabase>, DbError>;
}

/// Everything one client relationship needs to exist.
#[derive(Debug, Clone)]
pub struct ProvisionRequest<'a> {
    pub username: &'a str,
    pub password: &'a SecureString,
    pub database: &'a str,
    pub roles: &'a BTreeSet<String>,
    pub extensions: &'a BTreeSet<String>,
    /// Decided by relationship kind, never by what the client asked for.
    pub admin: bool,
}

/// What a provisioning run changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProvisionOutcome {
    pub created_user: bool,
    pub created_database: bool,
    pub granted: Vec<String>,
    pub revoked: Vec<String>,
}

/// Turn a lost create race into "already there".
///
/// Returns `true` when this call created the object.
fn tolerate_race(result: Result<(), DbError>, object: &str) -> Result<bool, DbError> {
    match result {
        Ok(()) => Ok(true),
        Err(DbError::Duplicate(message)) => {
            tracing::info!(object, %message, "Lost create race, object already exists");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Provisioner bound to an admin connection on the master.
pub struct Provisioner<'a> {
    connector: &'a dyn Connector,
    master: &'a AdvertisementRecord,
    admin: Box<dyn BackendDatabase>,
}

impl<'a> Provisioner<'a> {
    /// Open the admin connection to the master.
    pub async fn connect(
        connector: &'a dyn Connector,
        master: &'a AdvertisementRecord,
    ) -> Result<Provisioner<'a>, DbError> {
        let admin = connector.connect(master, ADMIN_DATABASE).await?;
        Ok(Self {
            connector,
            master,
            admin,
        })
    }

    /// Run every step for one client, in dependency order.
    pub async fn provision(
        &mut self,
        request: &ProvisionRequest<'_>,
    ) -> Result<ProvisionOutcome, DbError> {
        let created_user = self
            .ensure_user(request.username, request.password, request.admin)
            .await?;
        let (granted, revoked) = self.reconcile_roles(request.username, request.roles).await?;
        let created_database = self
            .ensure_database(request.database, request.username)
            .await?;
        self.ensure_extensions(request.database, request.extensions)
            .await?;

        Ok(ProvisionOutcome {
            created_user,
            created_database,
            granted,
            revoked,
        })
    }

    /// Create the database if missing, then grant CONNECT to `user`.
    ///
    /// The grant is issued every time so users added after the database
    /// existed still get access.
    pub async fn ensure_database(&mut self, name: &str, user: &str) -> Result<bool, DbError> {
        let mut created = false;
        if !self.admin.database_exists(name).await? {
            tracing::info!(database = %name, "Creating database");
            created = tolerate_race(self.admin.create_database(name).await, name)?;
        }
        self.admin.grant_connect(name, user).await?;
        Ok(created)
    }

    /// Create the login role if missing.
    pub async fn ensure_user(
        &mut self,
        name: &str,
        password: &SecureString,
        superuser: bool,
    ) -> Result<bool, DbError> {
        if self.admin.role_exists(name).await? {
            return Ok(false);
        }
        if superuser {
            tracing::info!(user = %name, "Creating superuser");
        } else {
            tracing::info!(user = %name, "Creating user");
        }
        tolerate_race(
            self.admin.create_login_role(name, password, superuser).await,
            name,
        )
    }

    /// Make the user's role memberships exactly `wanted`.
    ///
    /// Returns the roles granted and revoked, sorted.
    pub async fn reconcile_roles(
        &mut self,
        user: &str,
        wanted: &BTreeSet<String>,
    ) -> Result<(Vec<String>, Vec<String>), DbError> {
        let existing = self.admin.role_memberships(user).await?;
        let to_grant: Vec<String> = wanted.difference(&existing).cloned().collect();
        let to_revoke: Vec<String> = existing.difference(wanted).cloned().collect();

        for role in &to_grant {
            if !self.admin.role_exists(role).await? {
                tracing::info!(role = %role, "Creating role");
                tolerate_race(self.admin.create_group_role(role).await, role)?;
            }
            tracing::info!(role = %role, user = %user, "Granting role");
            self.admin.grant_role(role, user).await?;
        }

        for role in &to_revoke {
            tracing::info!(role = %role, user = %user, "Revoking role");
            self.admin.revoke_role(role, user).await?;
        }

        Ok((to_grant, to_revoke))
    }

    /// Create extensions over a connection to `database` itself.
    pub async fn ensure_extensions(
        &mut self,
        database: &str,
        extensions: &BTreeSet<String>,
    ) -> Result<(), DbError> {
        if extensions.is_empty() {
            return Ok(());
        }
        let mut conn = self.connector.connect(self.master, database).await?;
        for extension in extensions {
            tracing::debug!(database = %database, extension = %extension, "Ensuring extension");
            conn.create_extension(extension).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_is_not_an_error() {
        assert!(!tolerate_race(Err(DbError::Duplicate("exists".into())), "x").unwrap());
        assert!(tolerate_race(Ok(()), "x").unwrap());
        assert!(tolerate_race(Err(DbError::Query("boom".into())), "x").is_err());
    }

    #[test]
    fn connection_errors_are_classified() {
        let err = DbError::Connection {
            database: "postgres".into(),
            message: "refused".into(),
        };
        assert!(err.is_connection());
        assert!(!DbError::Query("x".into()).is_connection());
    }
}
