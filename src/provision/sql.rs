//! Statement text for provisioning.

use crate::credentials::SecureString;

use super::ident::{quote_identifier, quote_literal};

pub const DATABASE_EXISTS: &str = "SELECT datname FROM pg_database WHERE datname = $1";

pub const ROLE_EXISTS: &str = "SELECT rolname FROM pg_roles WHERE rolname = $1";

pub const ROLE_MEMBERSHIPS: &str = "\
SELECT role.rolname \
FROM pg_roles AS role, pg_roles AS member, pg_auth_members \
WHERE member.oid = pg_auth_members.member \
AND role.oid = pg_auth_members.roleid \
AND member.rolname = $1";

pub fn create_database(name: &str) -> String {
    format!("CREATE DATABASE {}", quote_identifier(name))
}

pub fn grant_connect(database: &str, user: &str) -> String {
    format!(
        "GRANT CONNECT ON DATABASE {} TO {}",
        quote_identifier(database),
        quote_identifier(user)
    )
}

pub fn create_login_role(name: &str, password: &SecureString, superuser: bool) -> String {
    let options = if superuser { "SUPERUSER LOGIN" } else { "LOGIN" };
    format!(
        "CREATE ROLE {} WITH {} PASSWORD {}",
        quote_identifier(name),
        options,
        quote_literal(password.expose())
    )
}

pub fn create_group_role(name: &str) -> String {
    format!("CREATE ROLE {} INHERIT NOLOGIN", quote_identifier(name))
}

pub fn grant_role(role: &str, user: &str) -> String {
    format!("GRANT {} TO {}", quote_identifier(role), quote_identifier(user))
}

pub fn revoke_role(role: &str, user: &str) -> String {
    format!("REVOKE {} FROM {}", quote_identifier(role), quote_identifier(user))
}

pub fn create_extension(name: &str) -> String {
    format!("CREATE EXTENSION IF NOT EXISTS {}", quote_identifier(name))
}
