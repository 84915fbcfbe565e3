//! The reference in-memory session store.
//!
//! Sessions live in a [`Cache`] keyed by [`SessionId`]; for this store the
//! cache is the only copy. Nothing is written to disk, so every session
//! disappears when the process exits.
//!
//! # Concurrency note
//!
//! Individual reads and writes go straight to the cache, which has its own
//! locking. Enumeration needs more than that: the sweep must see a
//! point-in-time view and must not skip or double-visit a session because
//! another task created or deleted one mid-walk. So structural changes
//! (`create`, `update`, `delete`) hold a shared guard and the two
//! enumeration calls hold it exclusively while they copy.

use tokio::sync::RwLock;
use tracing::{debug, trace, warn};
use warden_session::{Session, SessionError, SessionId};

use crate::{Cache, MapCache, SessionStore};

/// Name of the cache that holds session records.
pub const ACTIVE_SESSIONS_CACHE: &str = "warden-activeSessionCache";

/// Keeps sessions in process memory, routed through a pluggable cache.
pub struct MemorySessionStore<C = MapCache<SessionId, Session>> {
    cache: C,
    structure: RwLock<()>,
}

impl MemorySessionStore {
    /// Store backed by an unbounded [`MapCache`].
    pub fn new() -> Self {
        Self::with_cache(MapCache::named(ACTIVE_SESSIONS_CACHE))
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> MemorySessionStore<C>
where
    C: Cache<SessionId, Session>,
{
    /// Store backed by the given cache provider.
    pub fn with_cache(cache: C) -> Self {
        Self {
            cache,
            structure: RwLock::new(()),
        }
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Number of stored sessions, terminal ones included.
    pub fn len(&self) -> Result<usize, SessionError> {
        Ok(self.cache.len()?)
    }

    pub fn is_empty(&self) -> Result<bool, SessionError> {
        Ok(self.cache.is_empty()?)
    }

    /// Picks an id no stored session is using.
    fn fresh_id(&self) -> Result<SessionId, SessionError> {
        loop {
            let id = SessionId::generate();
            if self.cache.get(&id)?.is_none() {
                return Ok(id);
            }
            debug!(session_id = %id, "generated session id already in use, retrying");
        }
    }
}

impl<C> SessionStore for MemorySessionStore<C>
where
    C: Cache<SessionId, Session> + 'static,
{
    async fn create(&self, session: Session) -> Result<SessionId, SessionError> {
        let _structure = self.structure.read().await;

        let id = self.fresh_id()?;
        self.cache.put(id.clone(), session.with_id(id.clone()))?;

        debug!(session_id = %id, "session record created");
        Ok(id)
    }

    async fn read_session(&self, id: &SessionId) -> Result<Session, SessionError> {
        trace!(session_id = %id, "reading session record");
        self.cache
            .get(id)?
            .ok_or_else(|| SessionError::Unknown(id.clone()))
    }

    async fn update(&self, session: &Session) -> Result<(), SessionError> {
        if !session.id().is_assigned() {
            return Err(SessionError::Store(
                "cannot update a session that was never created".into(),
            ));
        }
        let _structure = self.structure.read().await;

        self.cache.put(session.id().clone(), session.clone())?;
        trace!(session_id = %session.id(), state = %session.state(), "session record updated");
        Ok(())
    }

    async fn delete(&self, session: &Session) -> Result<(), SessionError> {
        let _structure = self.structure.read().await;

        if self.cache.remove(session.id())?.is_some() {
            debug!(session_id = %session.id(), "session record deleted");
        }
        Ok(())
    }

    async fn get_active_sessions(&self) -> Result<Vec<Session>, SessionError> {
        let _structure = self.structure.write().await;

        let keys = self.cache.keys()?;
        let mut sessions = Vec::with_capacity(keys.len());
        for id in keys {
            // A cache is allowed to evict at any time; a key without a
            // value is simply not part of the snapshot.
            match self.cache.get(&id) {
                Ok(Some(session)) => sessions.push(session),
                Ok(None) => {}
                Err(e) => {
                    warn!(session_id = %id, error = %e, "skipping unreadable session record");
                }
            }
        }
        Ok(sessions)
    }

    async fn get_active_session_ids(&self) -> Result<Vec<SessionId>, SessionError> {
        let _structure = self.structure.write().await;
        Ok(self.cache.keys()?)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn new_session() -> Session {
        Session::new(None, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_create_assigns_unique_ids() {
        let store = MemorySessionStore::new();

        let a = store.create(new_session()).await.unwrap();
        let b = store.create(new_session()).await.unwrap();

        assert!(a.is_assigned());
        assert_ne!(a, b);
        assert_eq!(store.len().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_create_replaces_caller_supplied_id() {
        let store = MemorySessionStore::new();
        let id = store
            .create(new_session().with_id(SessionId::from("chosen-by-caller")))
            .await
            .unwrap();

        assert_ne!(id, SessionId::from("chosen-by-caller"));
        assert_eq!(store.read_session(&id).await.unwrap().id(), &id);
    }

    #[tokio::test]
    async fn test_update_unassigned_session_fails() {
        let store = MemorySessionStore::new();
        let result = store.update(&new_session()).await;
        assert!(matches!(result, Err(SessionError::Store(_))));
        assert!(store.is_empty().unwrap());
    }
}
