//! Session persistence over a single-table key-value store.
//!
//! This crate provides:
//! - A [`StorageGateway`] with single-key get/put/delete over an [`ItemStore`]
//! - A [`SessionManager`] that maps [`Session`]s to records and enforces
//!   expiration on every read
//! - SQLite and in-memory item stores
//!
//! # Example
//!
//! ```rust,ignore
//! use kvsession_store::{GatewayConfig, ManagerConfig, MemoryItemStore, SessionManager, StorageGateway};
//!
//! let gateway = StorageGateway::connect(
//!     GatewayConfig::new("local", "sessions"),
//!     Arc::new(MemoryItemStore::new()),
//! )?;
//! let manager = SessionManager::new(gateway, ManagerConfig::default())?;
//!
//! let session = manager.new_session(SessionId::generate(), SessionData::new());
//! manager.update_session(&session).await?;
//! manager.refresh_session(session.id()).await?;
//! ```

mod backend;
mod clock;
mod error;
mod gateway;
mod manager;
pub mod record;
mod session;
mod sqlite;

pub use backend::{ItemStore, MemoryItemStore};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Result, SessionError};
pub use gateway::{GatewayConfig, StorageGateway, is_valid_table_name};
pub use manager::{DEFAULT_TTL, ManagerConfig, RefreshTarget, SessionManager, SessionProvider};
pub use record::{AttributeValue, Item};
pub use session::{Session, SessionData, SessionId};
pub use sqlite::SqliteItemStore;
