//! Error types for the session layer.
//!
//! The failure set is deliberately closed: a caller holding a session id
//! either gets the session, or learns exactly why it can't have it. Upstream
//! code (an auth filter, an RPC interceptor) matches on these variants to
//! decide between "force re-authentication" and "retry later".

use crate::SessionId;

/// A session record exists but is in a terminal state.
///
/// Both variants mean the same thing to a caller: this session reference is
/// no longer usable and the subject must start a new one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidSession {
    /// The session was explicitly stopped (logout, admin kill, ...).
    #[error("session {0} has been stopped")]
    Stopped(SessionId),

    /// The session sat idle past its timeout and was expired by validation.
    #[error("session {0} has expired")]
    Expired(SessionId),
}

impl InvalidSession {
    /// The id of the terminal session.
    pub fn id(&self) -> &SessionId {
        match self {
            Self::Stopped(id) | Self::Expired(id) => id,
        }
    }
}

/// Errors that can occur during session management.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No record exists for the id: it never existed, or it was deleted.
    #[error("unknown session {0}")]
    Unknown(SessionId),

    /// The record exists but the session is stopped or expired.
    #[error(transparent)]
    Invalid(#[from] InvalidSession),

    /// The backing store (or its cache) failed. Never retried by the
    /// manager; retry policy belongs to the store.
    #[error("session store failure: {0}")]
    Store(String),
}

impl SessionError {
    /// `true` for the stopped/expired family.
    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid(_))
    }

    /// `true` if the session id is not known to the store.
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown(_))
    }

    /// `true` if the session reference can no longer be used and the
    /// subject has to re-authenticate. Store failures are transient and
    /// return `false`.
    pub fn requires_new_session(&self) -> bool {
        self.is_invalid() || self.is_unknown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sid(s: &str) -> SessionId {
        SessionId::from(s)
    }

    #[test]
    fn test_invalid_session_id_returns_inner_id() {
        assert_eq!(InvalidSession::Stopped(sid("a")).id(), &sid("a"));
        assert_eq!(InvalidSession::Expired(sid("b")).id(), &sid("b"));
    }

    #[test]
    fn test_invalid_converts_into_session_error() {
        let err: SessionError = InvalidSession::Expired(sid("abc")).into();
        assert!(err.is_invalid());
        assert!(!err.is_unknown());
        assert_eq!(err.to_string(), "session abc has expired");
    }

    #[test]
    fn test_requires_new_session_excludes_store_failures() {
        assert!(SessionError::Unknown(sid("x")).requires_new_session());
        assert!(
            SessionError::from(InvalidSession::Stopped(sid("x")))
                .requires_new_session()
        );
        assert!(
            !SessionError::Store("cache offline".into()).requires_new_session()
        );
    }
}
