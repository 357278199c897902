use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default)]
    pub proxy: ProxySettings,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub store: StoreSettings,
    /// Users that get a generated password and a `.pgpass` file.
    #[serde(default = "default_admin_users")]
    pub admin_users: Vec<AdminUser>,
}

/// Timeouts for talking to the backend database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Defaults {
    /// Connection timeout in seconds (default: 5).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u32,
}

/// Settings rendered into the `[pgbouncer]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxySettings {
    /// Address the proxy binds to, also advertised to clients as `host`.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    /// One of "session", "transaction", "statement".
    #[serde(default = "default_pool_mode")]
    pub pool_mode: String,
    #[serde(default = "default_max_client_conn")]
    pub max_client_conn: u32,
    #[serde(default = "default_pool_size")]
    pub default_pool_size: u32,
    #[serde(default = "default_auth_type")]
    pub auth_type: String,
}

/// Files written or read by a reconciliation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paths {
    #[serde(default = "default_config_file")]
    pub config_file: PathBuf,
    #[serde(default = "default_userlist_file")]
    pub userlist_file: PathBuf,
    #[serde(default = "default_console_script")]
    pub console_script: PathBuf,
    /// Persisted service lifecycle state.
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
    #[serde(default = "default_unix_socket_dir")]
    pub unix_socket_dir: PathBuf,
    #[serde(default = "default_logfile")]
    pub logfile: PathBuf,
    #[serde(default = "default_pidfile")]
    pub pidfile: PathBuf,
}

/// Locations of the distributed store contract files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Peer advertisement snapshot (read only).
    #[serde(default = "default_snapshot")]
    pub snapshot: PathBuf,
    /// Leader settings holding the replicated userlist.
    #[serde(default = "default_leader_settings")]
    pub leader_settings: PathBuf,
    /// Outgoing advertisement records.
    #[serde(default = "default_outbox")]
    pub outbox: PathBuf,
}

/// An administrative user that receives a `.pgpass` file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminUser {
    pub name: String,
    pub home: PathBuf,
}

fn default_connect_timeout() -> u32 {
    5
}

fn default_listen_addr() -> String {
    "127.0.0.1".to_string()
}

fn default_listen_port() -> u16 {
    6432
}

fn default_pool_mode() -> String {
    "session".to_string()
}

fn default_max_client_conn() -> u32 {
    100
}

fn default_pool_size() -> u32 {
    20
}

fn default_auth_type() -> String {
    "md5".to_string()
}

fn default_config_file() -> PathBuf {
    PathBuf::from("/etc/pgbouncer/pgbouncer.ini")
}

fn default_userlist_file() -> PathBuf {
    PathBuf::from("/etc/pgbouncer/userlist.txt")
}

fn default_console_script() -> PathBuf {
    PathBuf::from("/usr/local/bin/pgbouncer-cli")
}

fn default_state_file() -> PathBuf {
    PathBuf::from("/var/lib/poolctl/state.json")
}

fn default_unix_socket_dir() -> PathBuf {
    PathBuf::from("/var/run/postgresql")
}

fn default_logfile() -> PathBuf {
    PathBuf::from("/var/log/postgresql/pgbouncer.log")
}

fn default_pidfile() -> PathBuf {
    PathBuf::from("/var/run/postgresql/pgbouncer.pid")
}

fn default_snapshot() -> PathBuf {
    PathBuf::from("/var/lib/poolctl/peers.json")
}

fn default_leader_settings() -> PathBuf {
    PathBuf::from("/var/lib/poolctl/leader.json")
}

fn default_outbox() -> PathBuf {
    PathBuf::from("/var/lib/poolctl/outbox.json")
}

fn default_admin_users() -> Vec<AdminUser> {
    [
        ("root", "/root"),
        ("postgres", "/var/lib/postgresql"),
        ("ubuntu", "/home/ubuntu"),
        ("pgbouncer", "/var/lib/pgbouncer"),
        ("nagios", "/var/lib/nagios"),
    ]
    .into_iter()
    .map(|(name, home)| AdminUser {
        name: name.to_string(),
        home: PathBuf::from(home),
    })
    .collect()
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            connect_timeout_seconds: default_connect_timeout(),
        }
    }
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            listen_port: default_listen_port(),
            pool_mode: default_pool_mode(),
            max_client_conn: default_max_client_conn(),
            default_pool_size: default_pool_size(),
            auth_type: default_auth_type(),
        }
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            config_file: default_config_file(),
            userlist_file: default_userlist_file(),
            console_script: default_console_script(),
            state_file: default_state_file(),
            unix_socket_dir: default_unix_socket_dir(),
            logfile: default_logfile(),
            pidfile: default_pidfile(),
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            snapshot: default_snapshot(),
            leader_settings: default_leader_settings(),
            outbox: default_outbox(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            defaults: Defaults::default(),
            proxy: ProxySettings::default(),
            paths: Paths::default(),
            store: StoreSettings::default(),
            admin_users: default_admin_users(),
        }
    }
}

impl Config {
    /// Names of the administrative users, in configuration order.
    pub fn admin_user_names(&self) -> Vec<String> {
        self.admin_users.iter().map(|u| u.name.clone()).collect()
    }
}
