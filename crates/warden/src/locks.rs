//! Per-session critical sections.
//!
//! Every read-judge-write cycle on a session (a foreground touch, a sweep
//! expiring it) runs while holding that session's stripe. Two cycles on
//! the same id therefore never interleave, while cycles on different ids
//! usually proceed in parallel. A task only ever holds one stripe, so
//! stripes can't deadlock.

use std::hash::{BuildHasher, RandomState};

use tokio::sync::{Mutex, MutexGuard};
use warden_session::SessionId;

/// Fixed table of async mutexes, indexed by a hash of the session id.
pub(crate) struct SessionLocks {
    stripes: Box<[Mutex<()>]>,
    hasher: RandomState,
}

impl SessionLocks {
    pub(crate) const DEFAULT_STRIPES: usize = 64;

    pub(crate) fn new(stripes: usize) -> Self {
        let stripes = stripes.max(1);
        Self {
            stripes: (0..stripes).map(|_| Mutex::new(())).collect(),
            hasher: RandomState::new(),
        }
    }

    /// Waits for and holds the stripe guarding `id`.
    pub(crate) async fn lock(&self, id: &SessionId) -> MutexGuard<'_, ()> {
        self.stripes[self.stripe_of(id)].lock().await
    }

    fn stripe_of(&self, id: &SessionId) -> usize {
        (self.hasher.hash_one(id) % self.stripes.len() as u64) as usize
    }
}

impl Default for SessionLocks {
    fn default() -> Self {
        Self::new(Self::DEFAULT_STRIPES)
    }
}
