use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::types::Config;

const POOL_MODES: &[&str] = &["session", "transaction", "statement"];

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

impl Config {
    /// Returns the path to the configuration file.
    ///
    /// `POOLCTL_CONFIG` wins when set. Otherwise uses
    /// `~/.config/poolctl/config.toml` via `dirs::config_dir()`,
    /// falling back to the current directory.
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("POOLCTL_CONFIG") {
            if !path.is_empty() {
                return PathBuf::from(path);
            }
        }
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        config_dir.join("poolctl").join("config.toml")
    }

    /// Loads configuration from the default config file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Loads configuration from a specific file.
    ///
    /// - If the file doesn't exist, returns `Config::default()`.
    /// - If the file exists, parses it as TOML and validates.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// Checks:
    /// - The listen port is non-zero and the listen address is set
    /// - The pool mode is one PgBouncer understands
    /// - Admin user names are non-empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.proxy.listen_port == 0 {
            return Err(ConfigError::ValidationError {
                message: "listen_port must be non-zero".to_string(),
            });
        }

        if self.proxy.listen_addr.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                message: "listen_addr must not be empty".to_string(),
            });
        }

        if !POOL_MODES.contains(&self.proxy.pool_mode.as_str()) {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "Unknown pool_mode '{}' (expected one of: {})",
                    self.proxy.pool_mode,
                    POOL_MODES.join(", ")
                ),
            });
        }

        if let Some(user) = self.admin_users.iter().find(|u| u.name.trim().is_empty()) {
            return Err(ConfigError::ValidationError {
                message: format!("Admin user with home '{}' has an empty name", user.home.display()),
            });
        }

        Ok(())
    }
}
