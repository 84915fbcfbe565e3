//! The session storage contract.

use std::future::Future;
use std::sync::Arc;

use warden_session::{Session, SessionError, SessionId};

/// Persistence and enumeration for session records.
///
/// The store is the only component allowed to write or list sessions. It
/// owns concurrency control over its backing collection; callers may hit
/// it from any number of tasks at once.
///
/// Methods return `Send` futures so the manager can drive them from a
/// spawned sweep task, and so remote implementations can do real I/O.
/// Implementors can still write them as plain `async fn`.
pub trait SessionStore: Send + Sync + 'static {
    /// Persists a new session and returns the id the store assigned to it.
    ///
    /// Any id already on `session` is replaced.
    fn create(
        &self,
        session: Session,
    ) -> impl Future<Output = Result<SessionId, SessionError>> + Send;

    /// Fetches a session by id.
    ///
    /// # Errors
    /// [`SessionError::Unknown`] if there is no record for `id`.
    fn read_session(
        &self,
        id: &SessionId,
    ) -> impl Future<Output = Result<Session, SessionError>> + Send;

    /// Writes the full record, inserting it if absent. Last writer wins.
    fn update(
        &self,
        session: &Session,
    ) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// Removes the record. Deleting an absent session is not an error.
    fn delete(
        &self,
        session: &Session,
    ) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// Point-in-time copy of every session that hasn't been deleted,
    /// terminal ones included.
    ///
    /// A record that can't be read is left out of the copy rather than
    /// failing the whole call; only a failure to list the store is an error.
    fn get_active_sessions(
        &self,
    ) -> impl Future<Output = Result<Vec<Session>, SessionError>> + Send;

    /// Point-in-time list of every stored session id. Used by the
    /// validation sweep, which reads each session itself so a bad record
    /// costs one session, not the sweep.
    fn get_active_session_ids(
        &self,
    ) -> impl Future<Output = Result<Vec<SessionId>, SessionError>> + Send;
}

/// A shared store is still a store, so a caller can keep its own handle to
/// the store it gave the manager.
impl<S: SessionStore> SessionStore for Arc<S> {
    fn create(
        &self,
        session: Session,
    ) -> impl Future<Output = Result<SessionId, SessionError>> + Send {
        (**self).create(session)
    }

    fn read_session(
        &self,
        id: &SessionId,
    ) -> impl Future<Output = Result<Session, SessionError>> + Send {
        (**self).read_session(id)
    }

    fn update(
        &self,
        session: &Session,
    ) -> impl Future<Output = Result<(), SessionError>> + Send {
        (**self).update(session)
    }

    fn delete(
        &self,
        session: &Session,
    ) -> impl Future<Output = Result<(), SessionError>> + Send {
        (**self).delete(session)
    }

    fn get_active_sessions(
        &self,
    ) -> impl Future<Output = Result<Vec<Session>, SessionError>> + Send {
        (**self).get_active_sessions()
    }

    fn get_active_session_ids(
        &self,
    ) -> impl Future<Output = Result<Vec<SessionId>, SessionError>> + Send {
        (**self).get_active_session_ids()
    }
}
