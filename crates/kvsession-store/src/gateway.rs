//! Storage gateway: the three single-key operations over an [`ItemStore`],
//! bound to one region and table.

use std::path::PathBuf;
use std::sync::Arc;

use kvsession_config::{ConfigSource, keys};
use tracing::{debug, info, trace};

use crate::backend::ItemStore;
use crate::error::{Result, SessionError};
use crate::record::Item;
use crate::session::SessionId;

/// Check that `table` is a plain identifier (`[A-Za-z_][A-Za-z0-9_]*`) outside
/// the `sqlite_` namespace. Keywords are allowed; stores quote the name.
pub fn is_valid_table_name(table: &str) -> bool {
    if table
        .get(..7)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("sqlite_"))
    {
        return false;
    }
    let mut chars = table.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Connection settings for the backing store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Region the store lives in.
    pub region: String,
    /// Table holding session records.
    pub table: String,
    /// Credentials artifact; when set it must exist.
    pub credentials_file: Option<PathBuf>,
}

impl GatewayConfig {
    /// Create a configuration without a credentials file.
    pub fn new(region: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            table: table.into(),
            credentials_file: None,
        }
    }

    /// Declare a credentials file.
    pub fn with_credentials_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_file = Some(path.into());
        self
    }

    /// Read region, table and credentials file from a config source.
    pub fn from_source(source: &dyn ConfigSource) -> Result<Self> {
        let region = source.require_str(keys::STORE_REGION)?;
        let table = source.require_str(keys::STORE_TABLE)?;
        let credentials_file = source
            .get_str(keys::STORE_CREDENTIALS_FILE)?
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            region,
            table,
            credentials_file,
        })
    }

    /// Check the configuration before any call is made.
    pub fn validate(&self) -> Result<()> {
        if self.region.trim().is_empty() {
            return Err(SessionError::ConfigurationInvalid(
                "store region is empty".to_string(),
            ));
        }
        if !is_valid_table_name(&self.table) {
            return Err(SessionError::ConfigurationInvalid(format!(
                "'{}' is not a valid table name",
                self.table
            )));
        }
        if let Some(path) = &self.credentials_file
            && !path.is_file()
        {
            return Err(SessionError::ConfigurationInvalid(format!(
                "credentials file {} does not exist",
                path.display()
            )));
        }
        Ok(())
    }
}

/// Single-key access to the session table.
///
/// Configuration is fixed at construction. Failures are returned as-is;
/// nothing is retried.
#[derive(Clone)]
pub struct StorageGateway {
    store: Arc<dyn ItemStore>,
    config: GatewayConfig,
}

impl std::fmt::Debug for StorageGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageGateway")
            .field("backend", &self.store.name())
            .field("config", &self.config)
            .finish()
    }
}

impl StorageGateway {
    /// Validate `config` and bind it to `store`.
    pub fn connect(config: GatewayConfig, store: Arc<dyn ItemStore>) -> Result<Self> {
        config.validate()?;
        info!(
            backend = store.name(),
            region = %config.region,
            table = %config.table,
            "Session storage gateway ready"
        );
        Ok(Self { store, config })
    }

    /// The active configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Fetch the record for `session_id`, if any.
    pub async fn get(&self, session_id: &SessionId) -> Result<Option<Item>> {
        trace!(region = %self.config.region, table = %self.config.table, session_id = %session_id, "get");
        let item = self
            .store
            .get_item(&self.config.table, session_id.as_str())
            .await?;
        debug!(session_id = %session_id, found = item.is_some(), "Fetched session record");
        Ok(item)
    }

    /// Write a record, replacing whatever is stored under its key.
    pub async fn put(&self, item: Item) -> Result<()> {
        trace!(region = %self.config.region, table = %self.config.table, "put");
        self.store.put_item(&self.config.table, item).await
    }

    /// Delete the record for `session_id`; a missing record is not an error.
    pub async fn delete(&self, session_id: &SessionId) -> Result<()> {
        trace!(region = %self.config.region, table = %self.config.table, session_id = %session_id, "delete");
        self.store
            .delete_item(&self.config.table, session_id.as_str())
            .await?;
        debug!(session_id = %session_id, "Deleted session record");
        Ok(())
    }
}
