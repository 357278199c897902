//! Typed views over raw advertisement records.

use std::collections::BTreeSet;

use crate::credentials::SecureString;

use super::{RecordMap, UnitName};

/// Replication role a backend unit claims for itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendRole {
    Standalone,
    Master,
    HotStandby,
}

impl BackendRole {
    /// Parse the advertised `state` field. Unknown values are not ready.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "standalone" => Some(Self::Standalone),
            "master" => Some(Self::Master),
            "hot_standby" | "hot standby" => Some(Self::HotStandby),
            _ => None,
        }
    }
}

/// Host and port of a backend server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

/// Advertisement published by one backend unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisementRecord {
    pub unit: UnitName,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub state: Option<BackendRole>,
    /// Units the backend has granted access to.
    pub allowed_units: BTreeSet<UnitName>,
    pub database: Option<String>,
    /// Administrative login handed out on the admin relationship.
    pub user: Option<String>,
    pub password: Option<SecureString>,
    pub version: Option<String>,
}

impl AdvertisementRecord {
    /// Build a record from the raw key/value map.
    ///
    /// Parsing is lenient: missing or malformed fields become `None` so the
    /// unit still counts toward cluster cardinality.
    pub fn from_map(unit: UnitName, map: &RecordMap) -> Self {
        Self {
            unit,
            host: non_empty(map.get("host")),
            port: map.get("port").and_then(|p| p.trim().parse().ok()),
            state: map.get("state").and_then(|s| BackendRole::parse(s)),
            allowed_units: map
                .get("allowed-units")
                .map(|s| s.split_whitespace().map(UnitName::new).collect())
                .unwrap_or_default(),
            database: non_empty(map.get("database")),
            user: non_empty(map.get("user")),
            password: non_empty(map.get("password")).map(SecureString::new),
            version: non_empty(map.get("version")),
        }
    }

    /// Where to reach this backend, if it has advertised enough to say.
    pub fn endpoint(&self) -> Option<Endpoint> {
        Some(Endpoint {
            host: self.host.clone()?,
            port: self.port?,
        })
    }

    pub fn allows(&self, unit: &UnitName) -> bool {
        self.allowed_units.contains(unit)
    }
}

/// What a client unit asks the proxy to provide.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientRequest {
    pub unit: Option<UnitName>,
    pub database: Option<String>,
    pub roles: BTreeSet<String>,
    pub extensions: BTreeSet<String>,
}

impl ClientRequest {
    pub fn from_map(unit: UnitName, map: &RecordMap) -> Self {
        Self {
            unit: Some(unit),
            database: non_empty(map.get("database")),
            roles: parse_list(map.get("roles")),
            extensions: parse_list(map.get("extensions")),
        }
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Split a comma-separated list, trimming entries and dropping empty ones.
fn parse_list(value: Option<&String>) -> BTreeSet<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> RecordMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn backend_record_parses_all_fields() {
        let record = AdvertisementRecord::from_map(
            UnitName::new("postgresql/0"),
            &map(&[
                ("host", "10.0.0.5"),
                ("port", "5432"),
                ("state", "hot standby"),
                ("allowed-units", "pgbouncer/0 pgbouncer/1"),
                ("user", "admin"),
                ("password", "s3cret"),
                ("version", "9.5"),
            ]),
        );
        assert_eq!(record.state, Some(BackendRole::HotStandby));
        assert_eq!(
            record.endpoint(),
            Some(Endpoint {
                host: "10.0.0.5".to_string(),
                port: 5432
            })
        );
        assert!(record.allows(&UnitName::new("pgbouncer/1")));
        assert_eq!(record.password.as_ref().map(|p| p.expose()), Some("s3cret"));
        assert_eq!(record.version.as_deref(), Some("9.5"));
    }

    #[test]
    fn incomplete_backend_record_has_no_endpoint() {
        let record =
            AdvertisementRecord::from_map(UnitName::new("postgresql/1"), &map(&[("port", "x")]));
        assert!(record.endpoint().is_none());
        assert!(record.state.is_none());
        assert!(record.allowed_units.is_empty());
    }

    #[test]
    fn client_request_lists_are_trimmed() {
        let request = ClientRequest::from_map(
            UnitName::new("psql/0"),
            &map(&[
                ("database", "  "),
                ("roles", " a_role, ,b "),
                ("extensions", "hstore"),
            ]),
        );
        assert!(request.database.is_none());
        assert_eq!(
            request.roles.into_iter().collect::<Vec<_>>(),
            vec!["a_role".to_string(), "b".to_string()]
        );
        assert!(request.extensions.contains("hstore"));
    }

    #[test]
    fn unknown_state_is_not_ready() {
        assert_eq!(BackendRole::parse("recovering"), None);
        assert_eq!(BackendRole::parse("standalone"), Some(BackendRole::Standalone));
    }
}
