use std::path::PathBuf;
use std::sync::Arc;

use tracing::trace;

use crate::store::RecordStore;

/// Record store configuration
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
    /// In-memory store (no persistence)
    Memory,

    /// SQLite database (default for most deployments)
    Sqlite {
        /// Path to the SQLite database file
        #[serde(default = "default_sqlite_path")]
        path: PathBuf,
    },
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Sqlite {
            path: default_sqlite_path(),
        }
    }
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./uptime.db")
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    /// Store configuration (optional - defaults to sqlite)
    pub store: Option<StoreConfig>,

    /// Server roster seeded on first run
    #[serde(default = "default_roster")]
    pub roster: Vec<String>,
}

fn default_roster() -> Vec<String> {
    crate::seed::DEFAULT_ROSTER
        .iter()
        .map(|name| name.to_string())
        .collect()
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str(&file_content)
        .map_err(|_| anyhow::anyhow!("Invalid configuration file provided!"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}

/// Construct the configured record store.
pub async fn build_store(config: &StoreConfig) -> anyhow::Result<Arc<dyn RecordStore>> {
    match config {
        StoreConfig::Memory => Ok(Arc::new(crate::store::MemoryStore::new())),

        #[cfg(feature = "store-sqlite")]
        StoreConfig::Sqlite { path } => {
            let store = crate::store::SqliteStore::new(path).await?;
            Ok(Arc::new(store))
        }

        #[cfg(not(feature = "store-sqlite"))]
        StoreConfig::Sqlite { .. } => {
            anyhow::bail!("built without sqlite support (enable the `store-sqlite` feature)")
        }
    }
}
