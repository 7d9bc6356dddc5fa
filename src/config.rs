//! Configuration resolution for invsync
//!
//! Resolution priority: command line (with env fallback via clap) → TOML
//! config file → compiled defaults.
//!
//! The only runtime configuration surface is the database path and the
//! collection-name bindings; the latter exist so test imports can run against
//! isolated collections instead of the production registry.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Default database file, relative to the working directory
pub const DEFAULT_DATABASE: &str = "inventory.db";

/// Collection-name bindings for the four document collections
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Collections {
    pub devices: String,
    pub users: String,
    pub interactions: String,
    /// Run snapshot collection ("DevicesUpdates" in the registry's terms)
    pub updates: String,
}

impl Default for Collections {
    fn default() -> Self {
        Self {
            devices: "devices".to_string(),
            users: "users".to_string(),
            interactions: "interactions".to_string(),
            updates: "device_updates".to_string(),
        }
    }
}

impl Collections {
    /// Validate that every binding is a safe SQL identifier
    ///
    /// Collection names are interpolated into statements, so they must be
    /// non-empty and restricted to `[A-Za-z0-9_]`.
    pub fn validate(&self) -> Result<()> {
        for name in [&self.devices, &self.users, &self.interactions, &self.updates] {
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(Error::Config(format!(
                    "Invalid collection name: {:?} (expected [A-Za-z0-9_]+)",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// On-disk TOML configuration shape
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub database: Option<PathBuf>,
    pub collections: Option<Collections>,
}

/// Fully resolved runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub database: PathBuf,
    pub collections: Collections,
}

impl Config {
    /// Resolve configuration from CLI arguments and an optional TOML file
    pub fn resolve(cli_database: Option<PathBuf>, config_file: Option<&Path>) -> Result<Self> {
        let toml_config = match config_file {
            Some(path) => {
                let loaded = load_toml_config(path)?;
                info!(path = %path.display(), "Loaded TOML config");
                loaded
            }
            None => TomlConfig::default(),
        };

        let database = cli_database
            .or(toml_config.database)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE));

        let collections = toml_config.collections.unwrap_or_default();
        collections.validate()?;

        Ok(Self {
            database,
            collections,
        })
    }
}

/// Load and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read config failed ({}): {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse config failed ({}): {}", path.display(), e)))
}
