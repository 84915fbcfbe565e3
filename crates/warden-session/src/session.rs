//! Session types: the server's record of one interaction.
//!
//! A session tracks:
//! - WHO started it (an opaque [`SessionId`] plus the originating host)
//! - WHEN it started, was last used, and (maybe) stopped
//! - HOW LONG it may sit idle before it expires
//! - WHAT the application stored on it (attributes)

use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::time::{Duration, SystemTime};

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::InvalidSession;

// ---------------------------------------------------------------------------
// SessionId
// ---------------------------------------------------------------------------

/// Opaque, unguessable session identifier.
///
/// Generated ids are 32 lowercase hex characters (128 random bits). The
/// default value is the empty, *unassigned* id carried by a session that
/// hasn't been persisted yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generates a fresh random id.
    pub fn generate() -> Self {
        let bytes: [u8; 16] = rand::rng().random();
        Self(bytes.iter().map(|b| format!("{b:02x}")).collect())
    }

    /// Returns `false` for the placeholder id of an unpersisted session.
    pub fn is_assigned(&self) -> bool {
        !self.0.is_empty()
    }

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
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Lifecycle state of a session, derived from its flags.
///
/// ```text
///            ┌──(stop)──────→ Stopped
///   Active ──┤
///            └──(validation)→ Expired
/// ```
///
/// Both terminal states are final. Expiration is never requested by a
/// caller; it is discovered when validation finds the idle timeout elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Active,
    Stopped,
    Expired,
}

impl SessionState {
    /// `true` for `Stopped` and `Expired`.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "Active"),
            Self::Stopped => write!(f, "Stopped"),
            Self::Expired => write!(f, "Expired"),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One session record.
///
/// Fields are private so the state machine can't be bypassed: every
/// mutation goes through a method that checks the session is still
/// `Active`. A stopped or expired session can be read, cloned, and
/// serialized, but not changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    id: SessionId,
    host: Option<IpAddr>,
    start_timestamp: SystemTime,
    last_access_time: SystemTime,
    stop_timestamp: Option<SystemTime>,
    /// Idle timeout. `Duration::ZERO` disables expiration.
    timeout: Duration,
    expired: bool,
    attributes: HashMap<String, Value>,
}

impl Session {
    /// Creates an unpersisted session starting now.
    pub fn new(host: Option<IpAddr>, timeout: Duration) -> Self {
        Self::started_at(host, timeout, SystemTime::now())
    }

    /// Creates an unpersisted session with an explicit start instant.
    pub fn started_at(host: Option<IpAddr>, timeout: Duration, now: SystemTime) -> Self {
        Self {
            id: SessionId::default(),
            host,
            start_timestamp: now,
            last_access_time: now,
            stop_timestamp: None,
            timeout,
            expired: false,
            attributes: HashMap::new(),
        }
    }

    /// Returns the session with `id` assigned.
    ///
    /// Stores call this exactly once, when the record is created.
    pub fn with_id(mut self, id: SessionId) -> Self {
        self.id = id;
        self
    }

    // -- Accessors --------------------------------------------------------

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn host(&self) -> Option<IpAddr> {
        self.host
    }

    pub fn start_timestamp(&self) -> SystemTime {
        self.start_timestamp
    }

    pub fn last_access_time(&self) -> SystemTime {
        self.last_access_time
    }

    pub fn stop_timestamp(&self) -> Option<SystemTime> {
        self.stop_timestamp
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_expired(&self) -> bool {
        self.expired
    }

    pub fn is_stopped(&self) -> bool {
        self.stop_timestamp.is_some()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        if self.expired {
            SessionState::Expired
        } else if self.is_stopped() {
            SessionState::Stopped
        } else {
            SessionState::Active
        }
    }

    /// How long the session has been idle as of `now`.
    ///
    /// Zero if the wall clock moved backwards past the last access.
    pub fn idle_for(&self, now: SystemTime) -> Duration {
        now.duration_since(self.last_access_time)
            .unwrap_or(Duration::ZERO)
    }

    /// `true` if the session is still running but has been idle longer than
    /// its timeout. Always `false` when the timeout is disabled.
    pub fn is_timed_out(&self, now: SystemTime) -> bool {
        !self.is_stopped()
            && !self.timeout.is_zero()
            && self.idle_for(now) > self.timeout
    }

    // -- Attributes -------------------------------------------------------

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Attribute keys in sorted order.
    pub fn attribute_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.attributes.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Stores an attribute, returning the previous value.
    pub fn set_attribute(
        &mut self,
        key: impl Into<String>,
        value: Value,
    ) -> Result<Option<Value>, InvalidSession> {
        self.ensure_active()?;
        Ok(self.attributes.insert(key.into(), value))
    }

    /// Removes an attribute, returning it if it was present.
    pub fn remove_attribute(&mut self, key: &str) -> Result<Option<Value>, InvalidSession> {
        self.ensure_active()?;
        Ok(self.attributes.remove(key))
    }

    // -- Transitions ------------------------------------------------------

    /// Refreshes the idle clock. Never moves `last_access_time` backwards.
    pub fn touch(&mut self, now: SystemTime) -> Result<(), InvalidSession> {
        self.ensure_active()?;
        if now > self.last_access_time {
            self.last_access_time = now;
        }
        Ok(())
    }

    /// Overrides the idle timeout. `Duration::ZERO` disables expiration.
    pub fn set_timeout(&mut self, timeout: Duration) -> Result<(), InvalidSession> {
        self.ensure_active()?;
        self.timeout = timeout;
        Ok(())
    }

    /// Active → Stopped.
    ///
    /// The stop instant doubles as the final access time.
    pub fn stop(&mut self, now: SystemTime) -> Result<(), InvalidSession> {
        self.ensure_active()?;
        let stopped_at = now.max(self.last_access_time);
        self.stop_timestamp = Some(stopped_at);
        self.last_access_time = stopped_at;
        Ok(())
    }

    /// Active → Expired. Returns `true` only on the call that actually
    /// flipped the flag, so callers can act on the transition exactly once.
    ///
    /// A stopped session is left alone.
    pub fn mark_expired(&mut self) -> bool {
        if self.state() != SessionState::Active {
            return false;
        }
        self.expired = true;
        true
    }

    fn ensure_active(&self) -> Result<(), InvalidSession> {
        match self.state() {
            SessionState::Active => Ok(()),
            SessionState::Stopped => Err(InvalidSession::Stopped(self.id.clone())),
            SessionState::Expired => Err(InvalidSession::Expired(self.id.clone())),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
