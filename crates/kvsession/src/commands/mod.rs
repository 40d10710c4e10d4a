//! CLI command handlers.

pub mod config;
pub mod session;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use kvsession_config::{ConfigSource, LoadedConfig, keys};
use kvsession_store::{
    GatewayConfig, ManagerConfig, SessionManager, SqliteItemStore, StorageGateway,
};

/// Default database filename within the data directory.
const DATABASE_FILE: &str = "sessions.db";

/// Shared context for all commands.
#[derive(Debug)]
pub struct Context {
    /// Merged configuration and where it came from.
    pub loaded: LoadedConfig,
    /// Database override from the command line.
    pub database: Option<PathBuf>,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Resolve the SQLite database path: flag, then config, then data dir.
    pub fn database_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.database {
            return Ok(path.clone());
        }
        if let Some(path) = self.loaded.config.get_str(keys::STORE_DATABASE)? {
            return Ok(PathBuf::from(path));
        }
        let data_dir = dirs::data_dir().context("no data directory; set session.store.database")?;
        Ok(data_dir.join("kvsession").join(DATABASE_FILE))
    }

    /// Build a session manager from configuration.
    ///
    /// Settings are validated before the database file is opened, so a bad
    /// configuration leaves nothing on disk.
    pub fn open_manager(&self) -> Result<SessionManager> {
        let config = &self.loaded.config;
        let gateway_config = GatewayConfig::from_source(config)
            .and_then(|c| c.validate().map(|()| c))
            .context("initializing session store")?;
        let manager_config =
            ManagerConfig::from_source(config).context("initializing session store")?;

        let path = self.database_path()?;
        let store = SqliteItemStore::open(&path)
            .with_context(|| format!("opening session database {}", path.display()))?;

        let gateway = StorageGateway::connect(gateway_config, Arc::new(store))
            .context("initializing session store")?;
        let manager =
            SessionManager::new(gateway, manager_config).context("initializing session store")?;
        Ok(manager)
    }
}
