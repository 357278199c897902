//! libpq-style connection strings.

use std::fmt;

use crate::peers::Endpoint;

/// `key=value` connection parameters in a fixed order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionString {
    host: Option<String>,
    port: Option<u16>,
    dbname: Option<String>,
    user: Option<String>,
    password: Option<String>,
}

impl ConnectionString {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host and port of an endpoint.
    pub fn to_endpoint(endpoint: &Endpoint) -> Self {
        Self::new().host(&endpoint.host).port(endpoint.port)
    }

    pub fn host(mut self, host: &str) -> Self {
        self.host = Some(host.to_string());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn dbname(mut self, dbname: &str) -> Self {
        self.dbname = Some(dbname.to_string());
        self
    }

    pub fn user(mut self, user: &str) -> Self {
        self.user = Some(user.to_string());
        self
    }

    pub fn password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }
}

/// Values are quoted only when libpq could not read them bare.
fn quote_value(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || c == '\'' || c == '\\');
    if !needs_quotes {
        return value.to_string();
    }
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

impl fmt::Display for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let port = self.port.map(|p| p.to_string());
        let params = [
            ("host", self.host.as_deref()),
            ("port", port.as_deref()),
            ("dbname", self.dbname.as_deref()),
            ("user", self.user.as_deref()),
            ("password", self.password.as_deref()),
        ];
        let rendered: Vec<String> = params
            .iter()
            .filter_map(|(key, value)| value.map(|v| format!("{}={}", key, quote_value(v))))
            .collect();
        f.write_str(&rendered.join(" "))
    }
}
