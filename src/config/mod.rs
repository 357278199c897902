//! Static configuration for the reconciler.
//!
//! Loaded from TOML; every field has a default so a missing file is a
//! valid (default) configuration.

mod loader;
mod types;

pub use loader::ConfigError;
pub use types::{AdminUser, Config, Defaults, Paths, ProxySettings, StoreSettings};
