//! Integration tests for the in-memory session store and cache providers.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};

use serde_json::json;
use warden_session::{Session, SessionError, SessionId};
use warden_store::{Cache, CacheError, MapCache, MemorySessionStore, SessionStore};

// =========================================================================
// Helpers
// =========================================================================

fn new_session() -> Session {
    Session::new(Some("10.0.0.1".parse().unwrap()), Duration::from_secs(60))
}

/// A cache that can be switched off to simulate an unreachable backend.
#[derive(Default)]
struct FlakyCache {
    inner: MapCache<SessionId, Session>,
    down: AtomicBool,
}

impl FlakyCache {
    fn check(&self) -> Result<(), CacheError> {
        if self.down.load(Ordering::SeqCst) {
            Err(CacheError::Unavailable("flaky".into()))
        } else {
            Ok(())
        }
    }
}

impl Cache<SessionId, Session> for FlakyCache {
    fn get(&self, key: &SessionId) -> Result<Option<Session>, CacheError> {
        self.check()?;
        self.inner.get(key)
    }

    fn put(&self, key: SessionId, value: Session) -> Result<Option<Session>, CacheError> {
        self.check()?;
        self.inner.put(key, value)
    }

    fn remove(&self, key: &SessionId) -> Result<Option<Session>, CacheError> {
        self.check()?;
        self.inner.remove(key)
    }

    fn keys(&self) -> Result<Vec<SessionId>, CacheError> {
        self.check()?;
        self.inner.keys()
    }
}

/// Fails reads of one chosen record; everything else works.
#[derive(Default)]
struct CorruptRecordCache {
    inner: MapCache<SessionId, Session>,
    corrupt: Mutex<Option<SessionId>>,
}

impl Cache<SessionId, Session> for CorruptRecordCache {
    fn get(&self, key: &SessionId) -> Result<Option<Session>, CacheError> {
        if self.corrupt.lock().unwrap().as_ref() == Some(key) {
            return Err(CacheError::Backend("corrupt record".into()));
        }
        self.inner.get(key)
    }

    fn put(&self, key: SessionId, value: Session) -> Result<Option<Session>, CacheError> {
        self.inner.put(key, value)
    }

    fn remove(&self, key: &SessionId) -> Result<Option<Session>, CacheError> {
        self.inner.remove(key)
    }

    fn keys(&self) -> Result<Vec<SessionId>, CacheError> {
        self.inner.keys()
    }
}

// =========================================================================
// CRUD
// =========================================================================

#[tokio::test]
async fn test_read_session_returns_created_record() {
    let store = MemorySessionStore::new();
    let id = store.create(new_session()).await.unwrap();

    let session = store.read_session(&id).await.unwrap();

    assert_eq!(session.id(), &id);
    assert_eq!(session.host(), Some("10.0.0.1".parse().unwrap()));
}

#[tokio::test]
async fn test_read_session_unknown_id_returns_unknown() {
    let store = MemorySessionStore::new();

    let result = store.read_session(&SessionId::from("missing")).await;

    assert!(
        matches!(result, Err(SessionError::Unknown(ref id)) if id.as_str() == "missing"),
        "expected Unknown, got {result:?}"
    );
}

#[tokio::test]
async fn test_update_overwrites_full_record() {
    let store = MemorySessionStore::new();
    let id = store.create(new_session()).await.unwrap();

    let mut session = store.read_session(&id).await.unwrap();
    session.set_attribute("user", json!("alice")).unwrap();
    session.stop(SystemTime::now()).unwrap();
    store.update(&session).await.unwrap();

    let stored = store.read_session(&id).await.unwrap();
    assert_eq!(stored, session);
    assert!(stored.is_stopped());
}

#[tokio::test]
async fn test_delete_removes_record_and_is_idempotent() {
    let store = MemorySessionStore::new();
    let id = store.create(new_session()).await.unwrap();
    let session = store.read_session(&id).await.unwrap();

    store.delete(&session).await.unwrap();
    store.delete(&session).await.unwrap();

    assert!(store.read_session(&id).await.unwrap_err().is_unknown());
    assert!(store.is_empty().unwrap());
}

#[tokio::test]
async fn test_terminal_sessions_stay_readable_until_deleted() {
    let store = MemorySessionStore::new();
    let id = store.create(new_session()).await.unwrap();

    let mut session = store.read_session(&id).await.unwrap();
    session.mark_expired();
    store.update(&session).await.unwrap();

    let stored = store.read_session(&id).await.unwrap();
    assert!(stored.is_expired());
}

// =========================================================================
// Snapshot enumeration
// =========================================================================

#[tokio::test]
async fn test_get_active_sessions_includes_every_stored_session() {
    let store = MemorySessionStore::new();
    let mut ids = Vec::new();
    for _ in 0..5 {
        ids.push(store.create(new_session()).await.unwrap());
    }

    let mut seen: Vec<SessionId> = store
        .get_active_sessions()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id().clone())
        .collect();
    seen.sort();
    ids.sort();

    assert_eq!(seen, ids);
}

#[tokio::test]
async fn test_get_active_sessions_is_detached_from_later_writes() {
    let store = MemorySessionStore::new();
    let id = store.create(new_session()).await.unwrap();

    let snapshot = store.get_active_sessions().await.unwrap();
    store.create(new_session()).await.unwrap();
    store
        .delete(&store.read_session(&id).await.unwrap())
        .await
        .unwrap();

    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id(), &id);
}

#[tokio::test]
async fn test_get_active_sessions_skips_unreadable_record() {
    let store = MemorySessionStore::with_cache(CorruptRecordCache::default());
    let bad = store.create(new_session()).await.unwrap();
    let good = store.create(new_session()).await.unwrap();
    *store.cache().corrupt.lock().unwrap() = Some(bad.clone());

    let snapshot = store.get_active_sessions().await.unwrap();

    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id(), &good);
}

#[tokio::test]
async fn test_get_active_session_ids_lists_unreadable_records_too() {
    let store = MemorySessionStore::with_cache(CorruptRecordCache::default());
    let bad = store.create(new_session()).await.unwrap();
    let good = store.create(new_session()).await.unwrap();
    *store.cache().corrupt.lock().unwrap() = Some(bad.clone());

    let mut ids = store.get_active_session_ids().await.unwrap();
    ids.sort();
    let mut expected = vec![bad, good];
    expected.sort();

    assert_eq!(ids, expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_snapshot_never_duplicates_under_concurrent_creates() {
    let store = Arc::new(MemorySessionStore::new());

    let writer = {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            for _ in 0..200 {
                store.create(new_session()).await.unwrap();
            }
        })
    };

    for _ in 0..20 {
        let snapshot = store.get_active_sessions().await.unwrap();
        let mut ids: Vec<_> = snapshot.iter().map(|s| s.id().clone()).collect();
        let before = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), before, "snapshot visited a session twice");
        tokio::task::yield_now().await;
    }

    writer.await.unwrap();
    assert_eq!(store.get_active_sessions().await.unwrap().len(), 200);
}

// =========================================================================
// Shared handles and custom caches
// =========================================================================

#[tokio::test]
async fn test_arc_store_shares_records() {
    let store = Arc::new(MemorySessionStore::new());
    let handle = Arc::clone(&store);

    let id = handle.create(new_session()).await.unwrap();

    assert!(SessionStore::read_session(&store, &id).await.is_ok());
}

#[tokio::test]
async fn test_cache_failure_propagates_as_store_error() {
    let store = MemorySessionStore::with_cache(FlakyCache::default());
    let id = store.create(new_session()).await.unwrap();

    store.cache().down.store(true, Ordering::SeqCst);

    assert!(matches!(
        store.read_session(&id).await,
        Err(SessionError::Store(_))
    ));
    assert!(matches!(
        store.get_active_sessions().await,
        Err(SessionError::Store(_))
    ));
    assert!(matches!(
        store.get_active_session_ids().await,
        Err(SessionError::Store(_))
    ));
    assert!(matches!(
        store.create(new_session()).await,
        Err(SessionError::Store(_))
    ));

    store.cache().down.store(false, Ordering::SeqCst);
    assert!(store.read_session(&id).await.is_ok(), "record survives the outage");
}

#[tokio::test]
async fn test_custom_cache_sees_every_write() {
    let store = MemorySessionStore::with_cache(MapCache::named("custom"));
    let id = store.create(new_session()).await.unwrap();

    assert_eq!(store.cache().name(), "custom");
    assert!(store.cache().get(&id).unwrap().is_some());
}
