//! Configuration parsing and management.
//!
//! `betgraph.toml` names the entity database and describes which contract
//! the projection follows.
//!
//! ```toml
//! [store]
//! path = "betgraph.db"
//!
//! [projection]
//! name = "gambleboard"
//! contract = "0x00000000000000000000000000000000000000aa"
//! start_block = 0
//! key_scheme = "concatenated"
//! ```

use std::path::{Path, PathBuf};

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::keys::KeyScheme;
use crate::runner::RunnerConfig;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BetgraphConfig {
    /// Entity store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Projection settings.
    #[serde(default)]
    pub projection: ProjectionConfig,
}

impl BetgraphConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or the projection name is
    /// empty.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Checks values serde cannot reject on its own.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] describing the first problem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.projection.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "projection.name must not be empty".to_string(),
            ));
        }
        if self.store.path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "store.path must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Builds the runner configuration for this projection.
    #[must_use]
    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            name: self.projection.name.clone(),
            contract: self.projection.contract,
            start_block: self.projection.start_block,
            key_scheme: self.projection.key_scheme,
        }
    }
}

/// Entity store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Path to the `SQLite` database.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

/// Projection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectionConfig {
    /// Cursor name; one per indexed contract.
    #[serde(default = "default_projection_name")]
    pub name: String,

    /// Emitting contract. Envelopes from other addresses are skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<Address>,

    /// First block to project.
    #[serde(default)]
    pub start_block: u64,

    /// Aggregate key scheme. Changing it on an existing store splits every
    /// event aggregate and league.
    #[serde(default)]
    pub key_scheme: KeyScheme,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            name: default_projection_name(),
            contract: None,
            start_block: 0,
            key_scheme: KeyScheme::default(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("betgraph.db")
}

fn default_projection_name() -> String {
    "gambleboard".to_string()
}

/// Configuration errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// I/O error reading configuration file.
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Validation error.
    #[error("configuration validation failed: {0}")]
    Validation(String),
}
