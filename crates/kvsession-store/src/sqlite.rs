//! SQLite-backed item store.
//!
//! Each logical table becomes one SQL table with the record columns:
//!
//! ```sql
//! CREATE TABLE "<table>" (
//!     session_id TEXT PRIMARY KEY,
//!     value      TEXT,
//!     creation   TEXT,
//!     expiration INTEGER
//! )
//! ```
//!
//! Columns other than the key are nullable so legacy records stay representable.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use tracing::{debug, info};

use crate::backend::{ItemStore, item_key};
use crate::error::{Result, SessionError};
use crate::gateway::is_valid_table_name;
use crate::record::{
    AttributeValue, CREATION_ATTRIBUTE, EXPIRATION_ATTRIBUTE, Item, KEY_ATTRIBUTE,
    VALUE_ATTRIBUTE,
};

struct SqliteInner {
    conn: Connection,
    created: HashSet<String>,
}

impl SqliteInner {
    fn ensure_table(&mut self, table: &str) -> Result<()> {
        if self.created.contains(table) {
            return Ok(());
        }
        if !is_valid_table_name(table) {
            return Err(SessionError::ConfigurationInvalid(format!(
                "'{table}' is not a valid table name"
            )));
        }
        self.conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS "{table}" (
                session_id TEXT PRIMARY KEY,
                value      TEXT,
                creation   TEXT,
                expiration INTEGER
            );
            "#
        ))?;
        debug!(table = %table, "Ensured session table");
        self.created.insert(table.to_string());
        Ok(())
    }
}

/// Item store backed by a SQLite database.
///
/// Calls run on the blocking thread pool; the connection is shared behind a
/// mutex, so clones of the store serialize on it.
#[derive(Clone)]
pub struct SqliteItemStore {
    inner: Arc<Mutex<SqliteInner>>,
}

impl std::fmt::Debug for SqliteItemStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteItemStore").finish_non_exhaustive()
    }
}

impl SqliteItemStore {
    /// Open or create a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                SessionError::unavailable("open", format!("{}: {e}", parent.display()))
            })?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        info!("Session database opened at {:?}", path);
        Ok(Self::from_connection(conn))
    }

    /// Create an in-memory database (useful for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        debug!("In-memory session database created");
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SqliteInner {
                conn,
                created: HashSet::new(),
            })),
        }
    }

    async fn run<T, F>(&self, operation: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteInner) -> Result<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let mut guard = inner.lock();
            f(&mut *guard)
        })
        .await
        .map_err(|e| SessionError::unavailable(operation, e.to_string()))?
    }
}

fn string_column(item: &Item, attribute: &str) -> Result<Option<String>> {
    match item.get(attribute) {
        None => Ok(None),
        Some(AttributeValue::S(s)) => Ok(Some(s.clone())),
        Some(AttributeValue::N(_)) => Err(SessionError::corrupt(
            item_key(item).unwrap_or_default(),
            format!("'{attribute}' must be a string attribute"),
        )),
    }
}

fn integer_column(item: &Item, attribute: &str) -> Result<Option<i64>> {
    let corrupt = |reason: String| SessionError::corrupt(item_key(item).unwrap_or_default(), reason);
    match item.get(attribute) {
        None => Ok(None),
        Some(AttributeValue::N(n)) => n
            .parse::<i64>()
            .map(Some)
            .map_err(|_| corrupt(format!("'{attribute}' value '{n}' is not an integer"))),
        Some(AttributeValue::S(_)) => Err(corrupt(format!(
            "'{attribute}' must be a number attribute"
        ))),
    }
}

#[async_trait]
impl ItemStore for SqliteItemStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn get_item(&self, table: &str, key: &str) -> Result<Option<Item>> {
        let table = table.to_string();
        let key = key.to_string();
        self.run("get", move |inner| {
            inner.ensure_table(&table)?;
            let row = inner
                .conn
                .query_row(
                    &format!(
                        "SELECT session_id, value, creation, expiration FROM \"{table}\" WHERE session_id = ?1"
                    ),
                    params![key],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, Option<String>>(1)?,
                            row.get::<_, Option<String>>(2)?,
                            row.get::<_, Option<i64>>(3)?,
                        ))
                    },
                )
                .optional()?;

            Ok(row.map(|(session_id, value, creation, expiration)| {
                let mut item = Item::new();
                item.insert(KEY_ATTRIBUTE.to_string(), AttributeValue::S(session_id));
                if let Some(value) = value {
                    item.insert(VALUE_ATTRIBUTE.to_string(), AttributeValue::S(value));
                }
                if let Some(creation) = creation {
                    item.insert(CREATION_ATTRIBUTE.to_string(), AttributeValue::S(creation));
                }
                if let Some(expiration) = expiration {
                    item.insert(
                        EXPIRATION_ATTRIBUTE.to_string(),
                        AttributeValue::number(expiration),
                    );
                }
                item
            }))
        })
        .await
    }

    async fn put_item(&self, table: &str, item: Item) -> Result<()> {
        let key = item_key(&item)?.to_string();
        let value = string_column(&item, VALUE_ATTRIBUTE)?;
        let creation = string_column(&item, CREATION_ATTRIBUTE)?;
        let expiration = integer_column(&item, EXPIRATION_ATTRIBUTE)?;

        for attribute in item.keys() {
            if ![KEY_ATTRIBUTE, VALUE_ATTRIBUTE, CREATION_ATTRIBUTE, EXPIRATION_ATTRIBUTE]
                .contains(&attribute.as_str())
            {
                debug!(attribute = %attribute, "Dropping attribute without a column");
            }
        }

        let table = table.to_string();
        self.run("put", move |inner| {
            inner.ensure_table(&table)?;
            inner.conn.execute(
                &format!(
                    "INSERT OR REPLACE INTO \"{table}\" (session_id, value, creation, expiration) VALUES (?1, ?2, ?3, ?4)"
                ),
                params![key, value, creation, expiration],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete_item(&self, table: &str, key: &str) -> Result<()> {
        let table = table.to_string();
        let key = key.to_string();
        self.run("delete", move |inner| {
            inner.ensure_table(&table)?;
            inner.conn.execute(
                &format!("DELETE FROM \"{table}\" WHERE session_id = ?1"),
                params![key],
            )?;
            Ok(())
        })
        .await
    }
}
