//! Dotted config paths read by the session store.

/// Region of the backing store.
pub const STORE_REGION: &str = "session.store.region";

/// Table holding session records.
pub const STORE_TABLE: &str = "session.store.table";

/// Optional credentials file; must exist when declared.
pub const STORE_CREDENTIALS_FILE: &str = "session.store.credentials_file";

/// SQLite database file used by the CLI backend.
pub const STORE_DATABASE: &str = "session.store.database";

/// Session expiration window in seconds.
pub const SESSION_EXPIRATION: &str = "session.expiration";

/// Default expiration window (10 minutes).
pub const DEFAULT_EXPIRATION_SECS: u64 = 10 * 60;
