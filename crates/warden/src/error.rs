//! Unified error type for the Warden crates.

use tracing_subscriber::util::TryInitError;
use warden_session::SessionError;
use warden_store::CacheError;

/// Top-level error that wraps every crate-specific error.
///
/// Manager operations return [`SessionError`] directly, since that is the
/// closed set a caller branches on. Applications that also touch caches or
/// set up logging can use this single type with `?` throughout.
#[derive(Debug, thiserror::Error)]
pub enum WardenError {
    /// A session-level error (unknown, stopped, expired, store failure).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A cache provider failed outside of a store call.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// A global tracing subscriber was already installed.
    #[error("tracing setup failed: {0}")]
    Telemetry(#[from] TryInitError),
}

#[cfg(test)]
mod tests {
    use warden_session::{InvalidSession, SessionId};

    use super::*;

    #[test]
    fn test_from_session_error() {
        let err: WardenError = SessionError::Unknown(SessionId::from("gone")).into();
        assert!(matches!(err, WardenError::Session(_)));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_invalid_session_via_session_error() {
        let err: SessionError = InvalidSession::Expired(SessionId::from("old")).into();
        let err: WardenError = err.into();
        assert!(matches!(
            err,
            WardenError::Session(SessionError::Invalid(InvalidSession::Expired(_)))
        ));
    }

    #[test]
    fn test_from_cache_error() {
        let err: WardenError = CacheError::Backend("timeout".into()).into();
        assert!(matches!(err, WardenError::Cache(_)));
        assert!(err.to_string().contains("timeout"));
    }
}
