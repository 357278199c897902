//! PostgreSQL access through `sqlx`.
//!
//! One plain connection per target database, no pool: a pass makes a
//! handful of short autocommit round trips and then drops it.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{ConnectOptions, Executor};

use crate::credentials::SecureString;
use crate::peers::AdvertisementRecord;

use super::{sql, BackendDatabase, Connector, DbError};

/// Opens connections to the elected master with the admin credentials it
/// advertised.
#[derive(Debug, Clone)]
pub struct PgConnector {
    connect_timeout: Duration,
}

impl PgConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl Connector for PgConnector {
    async fn connect(
        &self,
        master: &AdvertisementRecord,
        database: &str,
    ) -> Result<Box<dyn BackendDatabase>, DbError> {
        let endpoint = master.endpoint().ok_or_else(|| DbError::Connection {
            database: database.to_string(),
            message: format!("backend {} has no endpoint", master.unit),
        })?;

        let mut options = PgConnectOptions::new()
            .host(&endpoint.host)
            .port(endpoint.port)
            .database(database)
            // Statements carry passwords.
            .disable_statement_logging();
        if let Some(user) = &master.user {
            options = options.username(user);
        }
        if let Some(password) = &master.password {
            options = options.password(password.expose());
        }

        let conn = tokio::time::timeout(self.connect_timeout, options.connect())
            .await
            .map_err(|_| DbError::Connection {
                database: database.to_string(),
                message: format!("timed out after {}s", self.connect_timeout.as_secs()),
            })?
            .map_err(|e| DbError::from_sqlx(database, e))?;

        tracing::debug!(host = %endpoint.host, port = endpoint.port, database, "Connected");
        Ok(Box::new(PgDatabase {
            conn,
            database: database.to_string(),
        }))
    }
}

/// A live connection scoped to one database.
pub struct PgDatabase {
    conn: PgConnection,
    database: String,
}

impl PgDatabase {
    async fn exists(&mut self, query: &'static str, name: &str) -> Result<bool, DbError> {
        let row: Option<String> = sqlx::query_scalar(query)
            .bind(name)
            .fetch_optional(&mut self.conn)
            .await
            .map_err(|e| DbError::from_sqlx(&self.database, e))?;
        Ok(row.is_some())
    }

    async fn run(&mut self, statement: String) -> Result<(), DbError> {
        (&mut self.conn)
            .execute(statement.as_str())
            .await
            .map(|_| ())
            .map_err(|e| DbError::from_sqlx(&self.database, e))
    }
}

#[async_trait]
impl BackendDatabase for PgDatabase {
    async fn database_exists(&mut self, name: &str) -> Result<bool, DbError> {
        self.exists(sql::DATABASE_EXISTS, name).await
    }

    async fn create_database(&mut self, name: &str) -> Result<(), DbError> {
        self.run(sql::create_database(name)).await
    }

    async fn grant_connect(&mut self, database: &str, user: &str) -> Result<(), DbError> {
        self.run(sql::grant_connect(database, user)).await
    }

    async fn role_exists(&mut self, name: &str) -> Result<bool, DbError> {
        self.exists(sql::ROLE_EXISTS, name).await
    }

    async fn create_login_role(
        &mut self,
        name: &str,
        password: &SecureString,
        superuser: bool,
    ) -> Result<(), DbError> {
        self.run(sql::create_login_role(name, password, superuser))
            .await
    }

    async fn create_group_role(&mut self, name: &str) -> Result<(), DbError> {
        self.run(sql::create_group_role(name)).await
    }

    async fn role_memberships(&mut self, user: &str) -> Result<BTreeSet<String>, DbError> {
        let roles: Vec<String> = sqlx::query_scalar(sql::ROLE_MEMBERSHIPS)
            .bind(user)
            .fetch_all(&mut self.conn)
            .await
            .map_err(|e| DbError::from_sqlx(&self.database, e))?;
        Ok(roles.into_iter().collect())
    }

    async fn grant_role(&mut self, role: &str, user: &str) -> Result<(), DbError> {
        self.run(sql::grant_role(role, user)).await
    }

    async fn revoke_role(&mut self, role: &str, user: &str) -> Result<(), DbError> {
        self.run(sql::revoke_role(role, user)).await
    }

    async fn create_extension(&mut self, name: &str) -> Result<(), DbError> {
        self.run(sql::create_extension(name)).await
    }
}

impl DbError {
    /// Classify a driver error.
    ///
    /// Duplicate-object SQLSTATEs mean another actor won a create race.
    fn from_sqlx(database: &str, err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) => match db.code().as_deref() {
                // duplicate_database, duplicate_object, unique_violation
                Some("42P04") | Some("42710") | Some("23505") => {
                    DbError::Duplicate(db.message().to_string())
                }
                _ => DbError::Query(db.to_string()),
            },
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => DbError::Connection {
                database: database.to_string(),
                message: err.to_string(),
            },
            other => DbError::Query(other.to_string()),
        }
    }
}
