//! Generated passwords, replicated through leader settings.
//!
//! Passwords are created lazily by the leader the first time a user needs
//! one and are never rotated. Followers only read: a follower asking for a
//! password the leader has not published yet gets `None` and must defer,
//! since a locally invented password would never match the leader's copy.

mod pgpass;
mod secret;
mod settings;
mod userlist;

use std::path::PathBuf;

use rand::distributions::Alphanumeric;
use rand::Rng;
use thiserror::Error;

pub use pgpass::{pgpass_contents, write_pgpass};
pub use secret::SecureString;
pub use settings::{LeaderSettings, MemorySettings, SettingsFile};
pub use userlist::Userlist;

/// Leader settings key holding the rendered userlist.
pub const USERLIST_KEY: &str = "userlist";

const PASSWORD_LEN: usize = 40;

/// Errors from the credential store.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Malformed userlist at line {line}")]
    MalformedUserlist { line: usize },

    #[error("Failed to access leader settings '{path}': {source}")]
    Settings {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Leader settings '{path}' are not valid JSON: {source}")]
    SettingsFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Password store over leader settings.
pub struct CredentialStore<'a, S: LeaderSettings> {
    settings: &'a S,
    is_leader: bool,
}

impl<'a, S: LeaderSettings> CredentialStore<'a, S> {
    pub fn new(settings: &'a S, is_leader: bool) -> Self {
        Self {
            settings,
            is_leader,
        }
    }

    pub fn is_leader(&self) -> bool {
        self.is_leader
    }

    /// The current replicated userlist.
    pub fn userlist(&self) -> Result<Userlist, CredentialError> {
        match self.settings.get(USERLIST_KEY)? {
            Some(text) => Userlist::parse(&text),
            None => Ok(Userlist::default()),
        }
    }

    /// The raw userlist text, if the leader has published one.
    pub fn raw_userlist(&self) -> Result<Option<String>, CredentialError> {
        self.settings.get(USERLIST_KEY)
    }

    /// Return the user's password, creating it when this unit leads.
    ///
    /// `Ok(None)` means the password does not exist yet and this unit may
    /// not create it.
    pub fn get_or_create(&self, username: &str) -> Result<Option<SecureString>, CredentialError> {
        let mut userlist = self.userlist()?;
        if let Some(password) = userlist.get(username) {
            return Ok(Some(password.clone()));
        }

        if !self.is_leader {
            tracing::debug!(user = %username, "Password not yet published by leader");
            return Ok(None);
        }

        let password = generate_password();
        userlist.insert_new(username, password.clone());
        self.settings.set(USERLIST_KEY, &userlist.render())?;
        tracing::info!(user = %username, "Generated password");
        Ok(Some(password))
    }
}

/// A fresh random alphanumeric password.
pub fn generate_password() -> SecureString {
    let value: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(PASSWORD_LEN)
        .map(char::from)
        .collect();
    SecureString::new(value)
}
