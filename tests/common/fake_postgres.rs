//! In-memory PostgreSQL stand-in for provisioning tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use poolctl::credentials::SecureString;
use poolctl::peers::AdvertisementRecord;
use poolctl::provision::{BackendDatabase, Connector, DbError, ADMIN_DATABASE};

/// A role as the catalog would show it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub login: bool,
    pub superuser: bool,
    pub password: Option<String>,
}

/// Catalog state shared by every connection.
#[derive(Debug)]
pub struct Cluster {
    pub databases: BTreeSet<String>,
    pub roles: BTreeMap<String, Role>,
    /// user -> roles it is a member of
    pub memberships: BTreeMap<String, BTreeSet<String>>,
    /// (database, user)
    pub connect_grants: BTreeSet<(String, String)>,
    /// database -> extensions
    pub extensions: BTreeMap<String, BTreeSet<String>>,
    /// Databases connections were opened against, in order.
    pub connections: Vec<String>,
    /// Every mutating statement, in order.
    pub statements: Vec<String>,
}

impl Default for Cluster {
    fn default() -> Self {
        Self {
            databases: [ADMIN_DATABASE.to_string()].into(),
            roles: BTreeMap::new(),
            memberships: BTreeMap::new(),
            connect_grants: BTreeSet::new(),
            extensions: BTreeMap::new(),
            connections: Vec::new(),
            statements: Vec::new(),
        }
    }
}

impl Cluster {
    pub fn members_of(&self, user: &str) -> BTreeSet<String> {
        self.memberships.get(user).cloned().unwrap_or_default()
    }
}

/// Connector handing out connections to one shared [`Cluster`].
#[derive(Debug, Clone, Default)]
pub struct FakePostgres {
    cluster: Arc<Mutex<Cluster>>,
    unreachable: Arc<AtomicBool>,
    dropping: Arc<AtomicBool>,
    race_next_create: Arc<AtomicBool>,
    unavailable_extensions: Arc<Mutex<BTreeSet<String>>>,
}

impl FakePostgres {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse new connections.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Accept connections but fail every statement as a dropped connection.
    pub fn set_dropping(&self, dropping: bool) {
        self.dropping.store(dropping, Ordering::SeqCst);
    }

    /// The next CREATE finds the object already created by someone else.
    pub fn lose_next_create_race(&self) {
        self.race_next_create.store(true, Ordering::SeqCst);
    }

    /// `CREATE EXTENSION` of `name` fails as if it were not installed.
    pub fn remove_extension(&self, name: &str) {
        self.unavailable_extensions.lock().insert(name.to_string());
    }

    pub fn with_cluster<R>(&self, f: impl FnOnce(&Cluster) -> R) -> R {
        f(&self.cluster.lock())
    }
}

#[async_trait]
impl Connector for FakePostgres {
    async fn connect(
        &self,
        _master: &AdvertisementRecord,
        database: &str,
    ) -> Result<Box<dyn BackendDatabase>, DbError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(DbError::Connection {
                database: database.to_string(),
                message: "connection refused".to_string(),
            });
        }
        let mut cluster = self.cluster.lock();
        if !cluster.databases.contains(database) {
            return Err(DbError::Query(format!(
                "database \"{database}\" does not exist"
            )));
        }
        cluster.connections.push(database.to_string());
        Ok(Box::new(FakeConnection {
            database: database.to_string(),
            server: self.clone(),
        }))
    }
}

struct FakeConnection {
    database: String,
    server: FakePostgres,
}

impl FakeConnection {
    fn check(&self) -> Result<(), DbError> {
        if self.server.dropping.load(Ordering::SeqCst) {
            return Err(DbError::Connection {
                database: self.database.clone(),
                message: "server closed the connection unexpectedly".to_string(),
            });
        }
        Ok(())
    }

    /// Run a CREATE: `exists` checks, `insert` creates.
    fn create(
        &self,
        statement: String,
        exists: impl Fn(&Cluster) -> bool,
        insert: impl FnOnce(&mut Cluster),
    ) -> Result<(), DbError> {
        self.check()?;
        let mut cluster = self.server.cluster.lock();
        if self.server.race_next_create.swap(false, Ordering::SeqCst) {
            insert(&mut cluster);
            return Err(DbError::Duplicate(format!("{statement}: already exists")));
        }
        if exists(&cluster) {
            return Err(DbError::Duplicate(format!("{statement}: already exists")));
        }
        insert(&mut cluster);
        cluster.statements.push(statement);
        Ok(())
    }

    fn mutate(&self, statement: String, f: impl FnOnce(&mut Cluster)) -> Result<(), DbError> {
        self.check()?;
        let mut cluster = self.server.cluster.lock();
        f(&mut cluster);
        cluster.statements.push(statement);
        Ok(())
    }
}

#[async_trait]
impl BackendDatabase for FakeConnection {
    async fn database_exists(&mut self, name: &str) -> Result<bool, DbError> {
        self.check()?;
        Ok(self.server.cluster.lock().databases.contains(name))
    }

    async fn create_database(&mut self, name: &str) -> Result<(), DbError> {
        let name = name.to_string();
        self.create(
            format!("CREATE DATABASE {name}"),
            |c| c.databases.contains(&name),
            |c| {
                c.databases.insert(name.clone());
            },
        )
    }

    async fn grant_connect(&mut self, database: &str, user: &str) -> Result<(), DbError> {
        self.mutate(format!("GRANT CONNECT ON {database} TO {user}"), |c| {
            c.connect_grants
                .insert((database.to_string(), user.to_string()));
        })
    }

    async fn role_exists(&mut self, name: &str) -> Result<bool, DbError> {
        self.check()?;
        Ok(self.server.cluster.lock().roles.contains_key(name))
    }

    async fn create_login_role(
        &mut self,
        name: &str,
        password: &SecureString,
        superuser: bool,
    ) -> Result<(), DbError> {
        let role = Role {
            login: true,
            superuser,
            password: Some(password.expose().to_string()),
        };
        self.create(
            format!("CREATE ROLE {name} LOGIN"),
            |c| c.roles.contains_key(name),
            |c| {
                c.roles.insert(name.to_string(), role);
            },
        )
    }

    async fn create_group_role(&mut self, name: &str) -> Result<(), DbError> {
        let role = Role {
            login: false,
            superuser: false,
            password: None,
        };
        self.create(
            format!("CREATE ROLE {name} NOLOGIN"),
            |c| c.roles.contains_key(name),
            |c| {
                c.roles.insert(name.to_string(), role);
            },
        )
    }

    async fn role_memberships(&mut self, user: &str) -> Result<BTreeSet<String>, DbError> {
        self.check()?;
        Ok(self.server.cluster.lock().members_of(user))
    }

    async fn grant_role(&mut self, role: &str, user: &str) -> Result<(), DbError> {
        self.mutate(format!("GRANT {role} TO {user}"), |c| {
            c.memberships
                .entry(user.to_string())
                .or_default()
                .insert(role.to_string());
        })
    }

    async fn revoke_role(&mut self, role: &str, user: &str) -> Result<(), DbError> {
        self.mutate(format!("REVOKE {role} FROM {user}"), |c| {
            if let Some(roles) = c.memberships.get_mut(user) {
                roles.remove(role);
            }
        })
    }

    async fn create_extension(&mut self, name: &str) -> Result<(), DbError> {
        if self.server.unavailable_extensions.lock().contains(name) {
            return Err(DbError::Query(format!(
                "extension \"{name}\" is not available"
            )));
        }
        let database = self.database.clone();
        self.mutate(format!("CREATE EXTENSION IF NOT EXISTS {name}"), |c| {
            c.extensions
                .entry(database)
                .or_default()
                .insert(name.to_string());
        })
    }
}
