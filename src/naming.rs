//! Names derived from relationship and unit identifiers.
//!
//! The same relationship and client application always produce the same
//! user and database names, so a relationship that is removed and added
//! again (or a client that later connects to PostgreSQL directly) keeps its
//! grants.

use crate::peers::{RelationId, UnitName};

/// Replace characters that are awkward in SQL names with `_`.
pub fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            ':' | '-' | '/' | '"' | '\'' => '_',
            c => c,
        })
        .collect()
}

/// Login role for a client relationship: `<relation>_<application>`.
///
/// Generated names always contain the relation id, so they can never
/// collide with the administrative users.
pub fn username(relation: &RelationId, client: &UnitName) -> String {
    format!(
        "{}_{}",
        sanitize(relation.as_str()),
        sanitize(client.application())
    )
}

/// Database used when a client does not request one explicitly.
pub fn default_database(client: &UnitName) -> String {
    sanitize(client.application())
}
