//! Error types for session store operations.

use kvsession_config::ConfigError;

/// Error type for session store operations.
///
/// "Not found" and "expired on read" are not errors: both surface as `Ok(None)`
/// from restore.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Required configuration is missing or unusable.
    #[error("Invalid configuration: {0}")]
    ConfigurationInvalid(String),

    /// The backing store could not be reached or rejected the call.
    #[error("Storage unavailable during {operation}: {message}")]
    StorageUnavailable {
        operation: &'static str,
        message: String,
    },

    /// SQLite backend failure.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored record could not be decoded into a session.
    #[error("Corrupt record for session {session_id}: {reason}")]
    CorruptRecord { session_id: String, reason: String },

    /// Refused to write a session whose expiration has already passed.
    #[error("Session expired: {0}")]
    Expired(String),
}

impl SessionError {
    /// Build a `StorageUnavailable` error for the given operation.
    pub fn unavailable(operation: &'static str, message: impl Into<String>) -> Self {
        Self::StorageUnavailable {
            operation,
            message: message.into(),
        }
    }

    /// Build a `CorruptRecord` error.
    pub fn corrupt(session_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CorruptRecord {
            session_id: session_id.into(),
            reason: reason.into(),
        }
    }

    /// Whether the failure came from the backing store rather than the data.
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, Self::StorageUnavailable { .. } | Self::Database(_))
    }
}

impl From<ConfigError> for SessionError {
    fn from(err: ConfigError) -> Self {
        Self::ConfigurationInvalid(err.to_string())
    }
}

/// Result type for session store operations.
pub type Result<T> = std::result::Result<T, SessionError>;
