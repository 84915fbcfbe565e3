//! Error types for cache providers.

use warden_session::SessionError;

/// Errors a [`Cache`](crate::Cache) implementation can report.
///
/// The in-memory [`MapCache`](crate::MapCache) never fails; these exist for
/// remote caches whose network or backend can.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The cache can't be reached right now.
    #[error("cache {0} unavailable")]
    Unavailable(String),

    /// The cache answered with an error.
    #[error("cache backend error: {0}")]
    Backend(String),
}

/// Cache failures reach callers as store failures; they are never masked.
impl From<CacheError> for SessionError {
    fn from(err: CacheError) -> Self {
        SessionError::Store(err.to_string())
    }
}
