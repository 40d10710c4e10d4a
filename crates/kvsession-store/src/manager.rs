//! Session lifecycle: restore, update, refresh and delete over a
//! [`StorageGateway`], with expiration enforced on every read.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kvsession_config::{ConfigSource, keys};
use tracing::{debug, info, warn};

use crate::backend::ItemStore;
use crate::clock::{Clock, SystemClock};
use crate::error::{Result, SessionError};
use crate::gateway::{GatewayConfig, StorageGateway};
use crate::record;
use crate::session::{Session, SessionData, SessionId};

/// Default expiration window.
pub const DEFAULT_TTL: Duration = Duration::from_secs(keys::DEFAULT_EXPIRATION_SECS);

/// Lifecycle settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Window added to "now" on creation and on every refresh.
    pub ttl: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self { ttl: DEFAULT_TTL }
    }
}

impl ManagerConfig {
    /// Create a configuration with the given window.
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    /// Read the expiration window, falling back to [`DEFAULT_TTL`].
    pub fn from_source(source: &dyn ConfigSource) -> Result<Self> {
        let secs = source.u64_or(keys::SESSION_EXPIRATION, keys::DEFAULT_EXPIRATION_SECS)?;
        let config = Self::new(Duration::from_secs(secs));
        config.validate()?;
        Ok(config)
    }

    /// A window shorter than one second would produce sessions that are
    /// expired the moment they are written.
    pub fn validate(&self) -> Result<()> {
        if self.ttl.as_secs() == 0 {
            return Err(SessionError::ConfigurationInvalid(format!(
                "'{}' must be at least one second",
                keys::SESSION_EXPIRATION
            )));
        }
        Ok(())
    }
}

/// What to refresh: an id to look up, or a session the caller already holds.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshTarget {
    /// Restore the session first.
    Identifier(SessionId),
    /// Use this session as-is, skipping the read.
    Resolved(Session),
}

impl From<SessionId> for RefreshTarget {
    fn from(id: SessionId) -> Self {
        Self::Identifier(id)
    }
}

impl From<&SessionId> for RefreshTarget {
    fn from(id: &SessionId) -> Self {
        Self::Identifier(id.clone())
    }
}

impl From<&str> for RefreshTarget {
    fn from(id: &str) -> Self {
        Self::Identifier(SessionId::from(id))
    }
}

impl From<Session> for RefreshTarget {
    fn from(session: Session) -> Self {
        Self::Resolved(session)
    }
}

/// The operations offered to callers such as authentication middleware.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Load a live session. Missing and expired sessions are both `None`.
    async fn restore_session(&self, session_id: &SessionId) -> Result<Option<Session>>;

    /// Remove a session. Removing a missing session succeeds.
    async fn delete_session(&self, session_id: &SessionId) -> Result<()>;

    /// Write a session, replacing any stored copy.
    async fn update_session(&self, session: &Session) -> Result<()>;

    /// Restart a session's window from now. Returns the refreshed session, or
    /// `None` when there was nothing live to refresh.
    async fn refresh_session(&self, target: RefreshTarget) -> Result<Option<Session>>;
}

/// Maps sessions to stored records and enforces their validity window.
///
/// There is no locking across calls: concurrent writers to the same id race
/// and the last write wins.
#[derive(Clone)]
pub struct SessionManager {
    gateway: StorageGateway,
    config: ManagerConfig,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("gateway", &self.gateway)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Create a manager over `gateway` using the system clock.
    pub fn new(gateway: StorageGateway, config: ManagerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            gateway,
            config,
            clock: Arc::new(SystemClock),
        })
    }

    /// Build the gateway and manager from configuration in one step.
    pub fn from_source(source: &dyn ConfigSource, store: Arc<dyn ItemStore>) -> Result<Self> {
        let gateway = StorageGateway::connect(GatewayConfig::from_source(source)?, store)?;
        let manager = Self::new(gateway, ManagerConfig::from_source(source)?)?;
        info!(ttl_secs = manager.config.ttl.as_secs(), "Session manager initialized");
        Ok(manager)
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The configured expiration window.
    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }

    /// The underlying gateway.
    pub fn gateway(&self) -> &StorageGateway {
        &self.gateway
    }

    /// Stamp a new session with `creation = now` and `expiration = now + ttl`.
    /// Nothing is written until [`update_session`](Self::update_session).
    pub fn new_session(&self, id: impl Into<SessionId>, data: SessionData) -> Session {
        Session::new(id, data, self.clock.now(), self.config.ttl)
    }

    /// Load a live session.
    ///
    /// A record whose expiration is at or before now is treated exactly like a
    /// missing one, whether or not the store still holds it.
    pub async fn restore_session(&self, session_id: &SessionId) -> Result<Option<Session>> {
        let Some(item) = self.gateway.get(session_id).await? else {
            return Ok(None);
        };

        let session = record::decode(session_id, &item, self.config.ttl).inspect_err(|e| {
            warn!(session_id = %session_id, error = %e, "Stored session could not be decoded");
        })?;

        if session.is_expired_at(self.clock.now()) {
            debug!(
                session_id = %session_id,
                expiration = %session.expiration(),
                "Session expired, treating as absent"
            );
            return Ok(None);
        }

        Ok(Some(session))
    }

    /// Remove a session.
    pub async fn delete_session(&self, session_id: &SessionId) -> Result<()> {
        self.gateway.delete(session_id).await
    }

    /// Write a session unconditionally.
    ///
    /// A session that has already expired is refused rather than written.
    pub async fn update_session(&self, session: &Session) -> Result<()> {
        if session.is_expired_at(self.clock.now()) {
            return Err(SessionError::Expired(session.id().to_string()));
        }

        self.gateway.put(record::encode(session)?).await?;
        debug!(
            session_id = %session.id(),
            expiration = %session.expiration(),
            "Session written"
        );
        Ok(())
    }

    /// Restart a session's window at `now + ttl` and write it back.
    ///
    /// Refreshing a missing or expired session does nothing. The read and the
    /// write are separate calls; a concurrent update in between is overwritten.
    pub async fn refresh_session(
        &self,
        target: impl Into<RefreshTarget>,
    ) -> Result<Option<Session>> {
        let mut session = match target.into() {
            RefreshTarget::Identifier(id) => match self.restore_session(&id).await? {
                Some(session) => session,
                None => {
                    debug!(session_id = %id, "Nothing to refresh");
                    return Ok(None);
                }
            },
            RefreshTarget::Resolved(session) => {
                if session.is_expired_at(self.clock.now()) {
                    debug!(session_id = %session.id(), "Held session already expired, not refreshing");
                    return Ok(None);
                }
                session
            }
        };

        session.extend(self.clock.now(), self.config.ttl);
        self.update_session(&session).await?;
        Ok(Some(session))
    }
}

#[async_trait]
impl SessionProvider for SessionManager {
    async fn restore_session(&self, session_id: &SessionId) -> Result<Option<Session>> {
        SessionManager::restore_session(self, session_id).await
    }

    async fn delete_session(&self, session_id: &SessionId) -> Result<()> {
        SessionManager::delete_session(self, session_id).await
    }

    async fn update_session(&self, session: &Session) -> Result<()> {
        SessionManager::update_session(self, session).await
    }

    async fn refresh_session(&self, target: RefreshTarget) -> Result<Option<Session>> {
        SessionManager::refresh_session(self, target).await
    }
}
