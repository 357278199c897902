//! The `userlist.txt` format.
//!
//! One `(username, password)` pair per line, both fields double-quoted
//! with embedded quotes doubled, separated by a single space:
//!
//! ```text
//! "db_2_psql" "Zq3...kP"
//! ```
//!
//! PgBouncer reads the same file as its `auth_file`.

use std::collections::BTreeMap;

use super::secret::SecureString;
use super::CredentialError;

/// Parsed password table, ordered by username.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Userlist {
    entries: BTreeMap<String, SecureString>,
}

impl Userlist {
    pub fn parse(text: &str) -> Result<Self, CredentialError> {
        let mut entries = BTreeMap::new();
        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            let fields = split_fields(line).ok_or(CredentialError::MalformedUserlist {
                line: index + 1,
            })?;
            match <[String; 2]>::try_from(fields) {
                Ok([user, password]) => {
                    entries.insert(user, SecureString::new(password));
                }
                Err(_) => return Err(CredentialError::MalformedUserlist { line: index + 1 }),
            }
        }
        Ok(Self { entries })
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (user, password) in &self.entries {
            out.push_str(&quote_field(user));
            out.push(' ');
            out.push_str(&quote_field(password.expose()));
            out.push('\n');
        }
        out
    }

    pub fn get(&self, username: &str) -> Option<&SecureString> {
        self.entries.get(username)
    }

    /// Insert a password unless the user already has one.
    ///
    /// Returns `true` when the entry was added.
    pub fn insert_new(&mut self, username: &str, password: SecureString) -> bool {
        if self.entries.contains_key(username) {
            return false;
        }
        self.entries.insert(username.to_string(), password);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn quote_field(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Split a line into fields. Returns `None` on an unterminated quote.
fn split_fields(line: &str) -> Option<Vec<String>> {
    let mut fields = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        let mut field = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            loop {
                match chars.next()? {
                    '"' if chars.peek() == Some(&'"') => {
                        chars.next();
                        field.push('"');
                    }
                    '"' => break,
                    c => field.push(c),
                }
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c == ' ' {
                    break;
                }
                field.push(c);
                chars.next();
            }
        }
        fields.push(field);

        match chars.next() {
            None => return Some(fields),
            Some(' ') => continue,
            // Text directly after a closing quote.
            Some(_) => return None,
        }
    }
}
