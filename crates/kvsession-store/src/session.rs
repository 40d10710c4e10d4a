//! Session domain types.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque session identifier; the primary key of a stored record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Arbitrary structured payload carried by a session.
pub type SessionData = serde_json::Map<String, Value>;

/// A user session with its validity window.
///
/// The id and creation time are fixed once the session exists. The
/// expiration only moves through [`SessionManager::refresh_session`], and is
/// always a whole number of seconds.
///
/// Sessions are created through [`SessionManager::new_session`], which stamps
/// the window from the manager's clock and TTL:
///
/// ```compile_fail
/// use kvsession_store::{Session, SessionData};
///
/// let ten_years = std::time::Duration::from_secs(10 * 365 * 24 * 60 * 60);
/// let _ = Session::new("abc", SessionData::new(), chrono::Utc::now(), ten_years);
/// ```
///
/// [`SessionManager::new_session`]: crate::SessionManager::new_session
/// [`SessionManager::refresh_session`]: crate::SessionManager::refresh_session
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    id: SessionId,
    data: SessionData,
    creation: DateTime<Utc>,
    expiration: DateTime<Utc>,
}

impl Session {
    /// Create a session first seen at `now`, valid for `ttl`.
    pub(crate) fn new(
        id: impl Into<SessionId>,
        data: SessionData,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            id: id.into(),
            data,
            creation: now,
            expiration: expiration_from(now, ttl),
        }
    }

    pub(crate) fn from_parts(
        id: SessionId,
        data: SessionData,
        creation: DateTime<Utc>,
        expiration: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            data,
            creation,
            expiration,
        }
    }

    /// The session identifier.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// The session payload.
    pub fn data(&self) -> &SessionData {
        &self.data
    }

    /// Mutable access to the session payload.
    pub fn data_mut(&mut self) -> &mut SessionData {
        &mut self.data
    }

    /// Set a single payload entry, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.data.insert(key.into(), value.into())
    }

    /// When the session was first persisted.
    pub fn creation(&self) -> DateTime<Utc> {
        self.creation
    }

    /// When the session stops being valid.
    pub fn expiration(&self) -> DateTime<Utc> {
        self.expiration
    }

    /// A session is expired once its expiration is at or before `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiration <= now
    }

    /// Restart the validity window from `now`.
    pub(crate) fn extend(&mut self, now: DateTime<Utc>, ttl: Duration) {
        self.expiration = expiration_from(now, ttl);
    }
}

/// `now + ttl`, truncated to whole seconds.
pub(crate) fn expiration_from(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
    now.timestamp()
        .checked_add(ttl_secs)
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use serde_json::json;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 250_000_000).unwrap()
    }

    #[test]
    fn test_new_session_window() {
        let session = Session::new("abc", SessionData::new(), t0(), Duration::from_secs(600));

        assert_eq!(session.id().as_str(), "abc");
        assert_eq!(session.creation(), t0());
        assert_eq!(session.expiration().timestamp(), 1_700_000_600);
        assert_eq!(session.expiration().timestamp_subsec_nanos(), 0);
    }

    #[test]
    fn test_expired_at_boundary() {
        let session = Session::new("abc", SessionData::new(), t0(), Duration::from_secs(10));
        let expiration = session.expiration();

        assert!(!session.is_expired_at(expiration - TimeDelta::seconds(1)));
        assert!(session.is_expired_at(expiration));
        assert!(session.is_expired_at(expiration + TimeDelta::seconds(1)));
    }

    #[test]
    fn test_extend_is_now_plus_ttl() {
        let ttl = Duration::from_secs(600);
        let mut session = Session::new("abc", SessionData::new(), t0(), ttl);

        let later = t0() + TimeDelta::seconds(590);
        session.extend(later, ttl);
        session.extend(later, ttl);

        assert_eq!(session.expiration().timestamp(), 1_700_000_000 + 590 + 600);
        assert_eq!(session.creation(), t0());
    }

    #[test]
    fn test_payload_access() {
        let mut session = Session::new("abc", SessionData::new(), t0(), Duration::from_secs(1));
        assert_eq!(session.insert("user", 1), None);
        assert_eq!(session.data().get("user"), Some(&json!(1)));
        session.data_mut().remove("user");
        assert!(session.data().is_empty());
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(SessionId::generate(), SessionId::generate());
    }

    #[test]
    fn test_overflowing_ttl_saturates() {
        let session = Session::new("abc", SessionData::new(), t0(), Duration::MAX);
        assert_eq!(session.expiration(), DateTime::<Utc>::MAX_UTC);
    }
}
