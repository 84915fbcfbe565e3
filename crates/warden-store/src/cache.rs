//! Pluggable cache providers.
//!
//! A store reads and writes session records through a [`Cache`]. For the
//! in-memory store the cache *is* the backing map; a clustered deployment
//! swaps in a distributed cache without touching the manager.

use std::collections::HashMap;
use std::hash::Hash;

use parking_lot::RwLock;

use crate::CacheError;

/// Key/value cache capability consumed by session stores.
///
/// Every operation works on owned values. `keys` returns a copy, never a
/// live view, so callers can iterate while other tasks keep writing.
pub trait Cache<K, V>: Send + Sync {
    fn get(&self, key: &K) -> Result<Option<V>, CacheError>;

    /// Inserts or replaces, returning the previous value.
    fn put(&self, key: K, value: V) -> Result<Option<V>, CacheError>;

    /// Removes, returning the value that was there.
    fn remove(&self, key: &K) -> Result<Option<V>, CacheError>;

    /// Snapshot of the current keys.
    fn keys(&self) -> Result<Vec<K>, CacheError>;

    fn len(&self) -> Result<usize, CacheError> {
        Ok(self.keys()?.len())
    }

    fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.len()? == 0)
    }
}

/// Unbounded `HashMap` cache. The default when nothing else is configured.
///
/// Fine for development and single-node deployments with a bounded session
/// population; production clusters should plug in a cache with eviction
/// and a shared backend.
#[derive(Debug)]
pub struct MapCache<K, V> {
    name: String,
    map: RwLock<HashMap<K, V>>,
}

impl<K, V> MapCache<K, V> {
    pub fn new() -> Self {
        Self::named("default")
    }

    /// Creates an empty cache with a name used in log output.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            map: RwLock::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<K, V> Default for MapCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Cache<K, V> for MapCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn get(&self, key: &K) -> Result<Option<V>, CacheError> {
        Ok(self.map.read().get(key).cloned())
    }

    fn put(&self, key: K, value: V) -> Result<Option<V>, CacheError> {
        Ok(self.map.write().insert(key, value))
    }

    fn remove(&self, key: &K) -> Result<Option<V>, CacheError> {
        Ok(self.map.write().remove(key))
    }

    fn keys(&self) -> Result<Vec<K>, CacheError> {
        Ok(self.map.read().keys().cloned().collect())
    }

    fn len(&self) -> Result<usize, CacheError> {
        Ok(self.map.read().len())
    }
}
