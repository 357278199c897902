//! INI rendering of the proxy configuration.

use std::fmt::Write;

use super::ProxyConfig;

const HEADER: &str = "# This file is maintained by poolctl. Local changes will be overwritten.\n";

/// Stanza names are double-quoted, inner quotes doubled.
fn quote_stanza(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Deterministic text: same input, same bytes.
pub(super) fn render(config: &ProxyConfig) -> String {
    let mut out = String::from(HEADER);

    out.push_str("\n[databases]\n");
    for (name, descriptor) in &config.databases {
        let _ = writeln!(out, "{} = {}", quote_stanza(name), descriptor);
    }

    let admins = config.admin_users.join(", ");
    let settings = [
        ("listen_addr", config.listen_addr.clone()),
        ("listen_port", config.listen_port.to_string()),
        ("auth_type", config.auth_type.clone()),
        ("auth_file", config.auth_file.display().to_string()),
        ("admin_users", admins.clone()),
        ("stats_users", admins),
        ("pool_mode", config.pool_mode.clone()),
        ("max_client_conn", config.max_client_conn.to_string()),
        ("default_pool_size", config.default_pool_size.to_string()),
        ("unix_socket_dir", config.unix_socket_dir.display().to_string()),
        ("logfile", config.logfile.display().to_string()),
        ("pidfile", config.pidfile.display().to_string()),
    ];

    out.push_str("\n[pgbouncer]\n");
    for (key, value) in settings {
        let _ = writeln!(out, "{key} = {value}");
    }
    out
}

/// `listen_addr` and `listen_port` from the `[pgbouncer]` section of a
/// rendered file, as written.
pub fn listen_settings(text: &str) -> (Option<String>, Option<String>) {
    let mut in_section = false;
    let mut addr = None;
    let mut port = None;

    for line in text.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            in_section = line == "[pgbouncer]";
            continue;
        }
        if !in_section || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        match key.trim() {
            "listen_addr" => addr = Some(value.trim().to_string()),
            "listen_port" => port = Some(value.trim().to_string()),
            _ => {}
        }
    }
    (addr, port)
}
