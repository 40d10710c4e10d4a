//! Item store abstraction.
//!
//! ```text
//! ItemStore (trait)       - single-item get/put/delete by primary key
//!     └── SqliteItemStore - SQLite implementation
//!     └── MemoryItemStore - in-process tables for tests and embedding
//! ```
//!
//! Every call is one round trip. There are no transactions, conditional
//! writes or scans; `put_item` overwrites unconditionally.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{Result, SessionError};
use crate::record::{Item, KEY_ATTRIBUTE};

/// A key-value store addressed by table name and `session_id` key.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Fetch the item stored under `key`. A missing item is `Ok(None)`.
    async fn get_item(&self, table: &str, key: &str) -> Result<Option<Item>>;

    /// Store `item` under its `session_id` attribute, replacing any existing item.
    async fn put_item(&self, table: &str, item: Item) -> Result<()>;

    /// Remove the item stored under `key`. Removing a missing item succeeds.
    async fn delete_item(&self, table: &str, key: &str) -> Result<()>;
}

/// Extract the primary key of an item about to be written.
pub(crate) fn item_key(item: &Item) -> Result<&str> {
    item.get(KEY_ATTRIBUTE)
        .and_then(|v| v.as_s())
        .ok_or_else(|| SessionError::corrupt("", format!("item has no string '{KEY_ATTRIBUTE}'")))
}

/// In-process item store.
#[derive(Debug, Default)]
pub struct MemoryItemStore {
    tables: Mutex<HashMap<String, HashMap<String, Item>>>,
    unavailable: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryItemStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `StorageUnavailable` (or recover).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of successful `put_item` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of items in a table.
    pub fn len(&self, table: &str) -> usize {
        self.tables.lock().get(table).map_or(0, HashMap::len)
    }

    /// Whether a table holds no items.
    pub fn is_empty(&self, table: &str) -> bool {
        self.len(table) == 0
    }

    fn check(&self, operation: &'static str) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SessionError::unavailable(operation, "memory store marked unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl ItemStore for MemoryItemStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get_item(&self, table: &str, key: &str) -> Result<Option<Item>> {
        self.check("get")?;
        Ok(self
            .tables
            .lock()
            .get(table)
            .and_then(|t| t.get(key))
            .cloned())
    }

    async fn put_item(&self, table: &str, item: Item) -> Result<()> {
        self.check("put")?;
        let key = item_key(&item)?.to_string();
        self.tables
            .lock()
            .entry(table.to_string())
            .or_default()
            .insert(key, item);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete_item(&self, table: &str, key: &str) -> Result<()> {
        self.check("delete")?;
        if let Some(t) = self.tables.lock().get_mut(table) {
            t.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::AttributeValue;

    fn item(key: &str, value: &str) -> Item {
        let mut item = Item::new();
        item.insert(KEY_ATTRIBUTE.to_string(), AttributeValue::S(key.to_string()));
        item.insert("value".to_string(), AttributeValue::S(value.to_string()));
        item
    }

    #[tokio::test]
    async fn test_put_get_overwrite() {
        let store = MemoryItemStore::new();
        store.put_item("t", item("a", "1")).await.unwrap();
        store.put_item("t", item("a", "2")).await.unwrap();

        let fetched = store.get_item("t", "a").await.unwrap().unwrap();
        assert_eq!(fetched["value"], AttributeValue::S("2".to_string()));
        assert_eq!(store.len("t"), 1);
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn test_tables_are_separate() {
        let store = MemoryItemStore::new();
        store.put_item("t1", item("a", "1")).await.unwrap();

        assert!(store.get_item("t2", "a").await.unwrap().is_none());
        assert!(store.is_empty("t2"));
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let store = MemoryItemStore::new();
        store.delete_item("t", "nope").await.unwrap();
        store.put_item("t", item("a", "1")).await.unwrap();
        store.delete_item("t", "a").await.unwrap();
        store.delete_item("t", "a").await.unwrap();
        assert!(store.get_item("t", "a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_requires_key() {
        let store = MemoryItemStore::new();
        let mut keyless = Item::new();
        keyless.insert("value".to_string(), AttributeValue::S("x".to_string()));
        assert!(store.put_item("t", keyless).await.is_err());
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_unavailable() {
        let store = MemoryItemStore::new();
        store.set_unavailable(true);

        let err = store.get_item("t", "a").await.unwrap_err();
        assert!(err.is_storage_failure());
        assert!(store.put_item("t", item("a", "1")).await.is_err());
        assert!(store.delete_item("t", "a").await.is_err());
        assert_eq!(store.write_count(), 0);

        store.set_unavailable(false);
        assert!(store.get_item("t", "a").await.unwrap().is_none());
    }
}
