//! Command implementations.

pub mod replay;
pub mod show;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use betgraph_core::{BetgraphConfig, SqliteEntityStore};
use tracing::debug;

/// Loads `path` if it exists, otherwise the defaults, then applies the
/// `--db` override.
pub fn load_config(path: &Path, db: Option<PathBuf>) -> Result<BetgraphConfig> {
    let mut config = if path.exists() {
        BetgraphConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?
    } else {
        debug!(path = %path.display(), "config file not found, using defaults");
        BetgraphConfig::default()
    };

    if let Some(db) = db {
        config.store.path = db;
    }
    Ok(config)
}

/// Opens the configured entity store.
pub fn open_store(config: &BetgraphConfig) -> Result<SqliteEntityStore> {
    SqliteEntityStore::open(&config.store.path).with_context(|| {
        format!(
            "failed to open entity store at {}",
            config.store.path.display()
        )
    })
}
