//! The validating session manager.
//!
//! This is the piece callers talk to. It's responsible for:
//! - Starting sessions and handing out their ids
//! - Validating a session on every access, so a stale id is rejected
//!   the moment it's used
//! - Running the background sweep that catches sessions nobody asks
//!   about anymore
//! - Announcing lifecycle transitions to subscribers
//!
//! # Concurrency note
//!
//! `SessionManager` is `Send + Sync` and holds no session state of its own;
//! everything lives in the store. Share it behind an `Arc`. Each operation
//! that may write a session holds that session's lock stripe for its whole
//! read-judge-write cycle, and the sweep goes through the same path, so a
//! touch can't resurrect a session the sweep just expired and the sweep
//! can't clobber a fresher access time.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, error, info, trace, warn};
use warden_session::{
    InvalidSession, Session, SessionConfig, SessionError, SessionEvent, SessionId, Verdict,
    judge,
};
use warden_store::{Cache, MemorySessionStore, SessionStore};
use warden_sweep::{
    MissedSweepPolicy, SessionValidator, SweepConfig, SweepMetrics, SweepReport,
    ValidationScheduler,
};

use crate::locks::SessionLocks;

// ---------------------------------------------------------------------------
// Shared core
// ---------------------------------------------------------------------------

/// Everything the foreground path and the sweep task share.
///
/// The scheduler holds an `Arc` to this (not to the manager), so there's no
/// reference cycle between the manager and its own background task.
struct ManagerCore<S> {
    store: S,
    config: SessionConfig,
    events: broadcast::Sender<SessionEvent>,
    locks: SessionLocks,
}

impl<S: SessionStore> ManagerCore<S> {
    /// Reads a session and judges it, persisting the expiration if this is
    /// the call that discovered it. The caller must hold the id's stripe.
    async fn load_validated(&self, id: &SessionId) -> Result<(Session, Verdict), SessionError> {
        let mut session = self.store.read_session(id).await?;
        let verdict = judge(&session, SystemTime::now());
        if verdict == Verdict::TimedOut {
            self.expire(&mut session).await?;
        }
        Ok((session, verdict))
    }

    async fn expire(&self, session: &mut Session) -> Result<(), SessionError> {
        let idle = session.idle_for(SystemTime::now());
        if !session.mark_expired() {
            return Ok(());
        }
        self.store.update(session).await?;

        info!(
            session_id = %session.id(),
            idle_ms = idle.as_millis() as u64,
            timeout_ms = session.timeout().as_millis() as u64,
            "session expired"
        );
        self.publish(SessionEvent::Expired(session.id().clone()));
        Ok(())
    }

    /// Fire-and-forget. `send` only fails when nobody is subscribed.
    fn publish(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    /// Re-judges one session under its lock. Returns `true` if this call
    /// expired it.
    async fn sweep_one(&self, id: &SessionId) -> Result<bool, SessionError> {
        let _guard = self.locks.lock(id).await;
        let (_, verdict) = self.load_validated(id).await?;
        Ok(verdict == Verdict::TimedOut)
    }
}

impl<S: SessionStore> SessionValidator for ManagerCore<S> {
    async fn validate_sessions(&self) -> SweepReport {
        let ids = match self.store.get_active_session_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                error!(error = %e, "could not enumerate sessions for validation");
                return SweepReport::default();
            }
        };

        let mut report = SweepReport::default();

        // Each session is read under its own stripe, so one record the
        // store can't produce is counted and skipped while the rest of the
        // sweep carries on.
        for id in &ids {
            match self.sweep_one(id).await {
                Ok(expired) => {
                    report.checked += 1;
                    if expired {
                        report.expired += 1;
                    }
                }
                Err(SessionError::Unknown(_)) => {
                    trace!(session_id = %id, "session deleted during sweep");
                }
                Err(e) => {
                    warn!(session_id = %id, error = %e, "failed to validate session during sweep");
                    report.failed += 1;
                }
            }
        }

        report
    }
}

// ---------------------------------------------------------------------------
// SessionManager
// ---------------------------------------------------------------------------

/// Creates, validates, and retires sessions.
///
/// ## Lifecycle
///
/// ```text
/// start() ──→ [Active] ──touch()──→ [Active]
///                │   │
///          stop()│   │idle > timeout (found by an access or a sweep)
///                ▼   ▼
///         [Stopped] [Expired] ──purge_invalid()──→ (deleted)
/// ```
///
/// Terminal sessions stay in the store, readable through
/// [`inspect`](Self::inspect), until they are purged.
pub struct SessionManager<S: SessionStore = MemorySessionStore> {
    core: Arc<ManagerCore<S>>,
    scheduler: ValidationScheduler<ManagerCore<S>>,
}

impl SessionManager {
    /// Builder with an in-memory store and default config.
    pub fn builder() -> SessionManagerBuilder {
        SessionManagerBuilder::new()
    }
}

impl<S: SessionStore> SessionManager<S> {
    // -- Lifecycle --------------------------------------------------------

    /// Starts a new session and returns its id.
    ///
    /// On the first call this also starts the validation sweep (unless it
    /// is disabled in the config).
    pub async fn start(&self, host: Option<IpAddr>) -> Result<SessionId, SessionError> {
        self.ensure_validation();

        let session = Session::new(host, self.core.config.global_session_timeout);
        let id = self.core.store.create(session).await?;

        info!(session_id = %id, host = ?host, "session started");
        self.core.publish(SessionEvent::Started(id.clone()));
        Ok(id)
    }

    /// Returns the session if it is still readable.
    ///
    /// Stopped sessions are returned as-is; expired ones are not.
    ///
    /// # Errors
    /// - [`SessionError::Unknown`]: no such session
    /// - [`InvalidSession::Expired`]: idle past its timeout
    pub async fn get_session(&self, id: &SessionId) -> Result<Session, SessionError> {
        self.read(id).await
    }

    /// Refreshes the session's idle clock.
    ///
    /// # Errors
    /// - [`SessionError::Unknown`]: no such session
    /// - [`InvalidSession::Stopped`] / [`InvalidSession::Expired`]: terminal
    pub async fn touch(&self, id: &SessionId) -> Result<(), SessionError> {
        self.mutate(id, |s| s.touch(SystemTime::now())).await?;
        trace!(session_id = %id, "session touched");
        Ok(())
    }

    /// Stops the session.
    ///
    /// A session that has already expired stays expired and the call
    /// succeeds without changing it: the first terminal state reached is
    /// the one that sticks.
    ///
    /// # Errors
    /// - [`SessionError::Unknown`]: no such session
    /// - [`InvalidSession::Stopped`]: already stopped
    pub async fn stop(&self, id: &SessionId) -> Result<(), SessionError> {
        let _guard = self.core.locks.lock(id).await;
        let (mut session, verdict) = self.core.load_validated(id).await?;

        match verdict {
            Verdict::Valid => {
                session.stop(SystemTime::now())?;
                self.core.store.update(&session).await?;
                info!(session_id = %id, "session stopped");
                self.core.publish(SessionEvent::Stopped(id.clone()));
                Ok(())
            }
            Verdict::Stopped => Err(InvalidSession::Stopped(id.clone()).into()),
            Verdict::Expired | Verdict::TimedOut => {
                debug!(session_id = %id, "stop requested for expired session, leaving it expired");
                Ok(())
            }
        }
    }

    /// `true` if the session exists and is active.
    pub async fn is_valid(&self, id: &SessionId) -> Result<bool, SessionError> {
        let _guard = self.core.locks.lock(id).await;
        match self.core.load_validated(id).await {
            Ok((_, verdict)) => Ok(verdict.is_valid()),
            Err(SessionError::Unknown(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Returns the session in whatever state it is in, so callers can find
    /// out why a session ended. Still validates, so an idle session found
    /// here is marked expired like on any other access.
    ///
    /// # Errors
    /// [`SessionError::Unknown`]: no such session.
    pub async fn inspect(&self, id: &SessionId) -> Result<Session, SessionError> {
        let _guard = self.core.locks.lock(id).await;
        let (session, _) = self.core.load_validated(id).await?;
        Ok(session)
    }

    // -- Timeout and attributes --------------------------------------------

    /// The session's idle timeout.
    pub async fn timeout(&self, id: &SessionId) -> Result<Duration, SessionError> {
        Ok(self.read(id).await?.timeout())
    }

    /// Overrides the session's idle timeout. `Duration::ZERO` disables
    /// expiration for this session.
    pub async fn set_timeout(&self, id: &SessionId, timeout: Duration) -> Result<(), SessionError> {
        self.mutate(id, |s| s.set_timeout(timeout)).await
    }

    pub async fn attribute(&self, id: &SessionId, key: &str) -> Result<Option<Value>, SessionError> {
        Ok(self.read(id).await?.attribute(key).cloned())
    }

    pub async fn attribute_keys(&self, id: &SessionId) -> Result<Vec<String>, SessionError> {
        Ok(self.read(id).await?.attribute_keys())
    }

    /// Stores an attribute, returning the previous value.
    pub async fn set_attribute(
        &self,
        id: &SessionId,
        key: impl Into<String>,
        value: Value,
    ) -> Result<Option<Value>, SessionError> {
        let key = key.into();
        self.mutate(id, move |s| s.set_attribute(key, value)).await
    }

    /// Removes an attribute, returning it if it was set.
    pub async fn remove_attribute(
        &self,
        id: &SessionId,
        key: &str,
    ) -> Result<Option<Value>, SessionError> {
        self.mutate(id, |s| s.remove_attribute(key)).await
    }

    // -- Validation ---------------------------------------------------------

    /// Judges every stored session now, expiring the idle ones.
    ///
    /// This is what the background sweep runs; calling it directly is
    /// useful for tests and admin tooling. Never fails: per-session
    /// problems are logged and counted in the report.
    pub async fn validate_sessions(&self) -> SweepReport {
        self.core.validate_sessions().await
    }

    /// Deletes every stopped or expired session from the store and returns
    /// their ids. Idle sessions not yet marked are expired first; records
    /// the store can't read are logged and left in place.
    pub async fn purge_invalid(&self) -> Result<Vec<SessionId>, SessionError> {
        let ids = self.core.store.get_active_session_ids().await?;
        let mut purged = Vec::new();

        for id in ids {
            let _guard = self.core.locks.lock(&id).await;
            let session = match self.core.load_validated(&id).await {
                Ok((session, verdict)) if !verdict.is_valid() => session,
                Ok(_) | Err(SessionError::Unknown(_)) => continue,
                Err(e) => {
                    warn!(session_id = %id, error = %e, "skipping unreadable session during purge");
                    continue;
                }
            };
            self.core.store.delete(&session).await?;
            purged.push(id);
        }

        if !purged.is_empty() {
            info!(count = purged.len(), "purged invalid sessions");
        }
        Ok(purged)
    }

    /// Stops the validation sweep, waiting for a sweep that is in progress.
    ///
    /// A later [`start`](Self::start) turns the sweep back on.
    pub async fn shutdown(&self) {
        self.scheduler.stop().await;
        info!("session manager shut down");
    }

    // -- Accessors ----------------------------------------------------------

    /// Receives every lifecycle event published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.core.events.subscribe()
    }

    pub fn store(&self) -> &S {
        &self.core.store
    }

    pub fn config(&self) -> &SessionConfig {
        &self.core.config
    }

    pub fn is_validation_running(&self) -> bool {
        self.scheduler.is_running()
    }

    pub fn scheduler_metrics(&self) -> SweepMetrics {
        self.scheduler.metrics()
    }

    // -- Internals ----------------------------------------------------------

    fn ensure_validation(&self) {
        if self.core.config.validation_scheduler_enabled && !self.scheduler.is_running() {
            self.scheduler.start();
        }
    }

    /// Read access: stopped sessions are fine, expired ones are not.
    async fn read(&self, id: &SessionId) -> Result<Session, SessionError> {
        let _guard = self.core.locks.lock(id).await;
        let (session, verdict) = self.core.load_validated(id).await?;
        if verdict.is_expiry() {
            return Err(InvalidSession::Expired(id.clone()).into());
        }
        Ok(session)
    }

    /// Write access: the session must be active. Applies `change` and
    /// writes the result back, all under the session's stripe.
    async fn mutate<T, F>(&self, id: &SessionId, change: F) -> Result<T, SessionError>
    where
        F: FnOnce(&mut Session) -> Result<T, InvalidSession>,
    {
        let _guard = self.core.locks.lock(id).await;
        let (mut session, verdict) = self.core.load_validated(id).await?;
        verdict.into_result(&session)?;

        let out = change(&mut session)?;
        self.core.store.update(&session).await?;
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for a [`SessionManager`].
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use warden::prelude::*;
///
/// # async fn demo() -> Result<(), SessionError> {
/// let manager = SessionManager::builder()
///     .config(SessionConfig::default().with_global_session_timeout(Duration::from_secs(900)))
///     .build();
///
/// let id = manager.start(None).await?;
/// manager.touch(&id).await?;
/// manager.stop(&id).await?;
/// manager.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct SessionManagerBuilder<S = MemorySessionStore> {
    config: SessionConfig,
    store: S,
    missed_sweep: MissedSweepPolicy,
    sweep_jitter: Duration,
    lock_stripes: usize,
}

impl SessionManagerBuilder {
    pub fn new() -> Self {
        Self {
            config: SessionConfig::default(),
            store: MemorySessionStore::new(),
            missed_sweep: MissedSweepPolicy::default(),
            sweep_jitter: Duration::ZERO,
            lock_stripes: SessionLocks::DEFAULT_STRIPES,
        }
    }
}

impl Default for SessionManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: SessionStore> SessionManagerBuilder<S> {
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Uses `store` instead of the in-memory default.
    pub fn store<T: SessionStore>(self, store: T) -> SessionManagerBuilder<T> {
        SessionManagerBuilder {
            config: self.config,
            store,
            missed_sweep: self.missed_sweep,
            sweep_jitter: self.sweep_jitter,
            lock_stripes: self.lock_stripes,
        }
    }

    /// Uses an in-memory store routed through `cache`.
    pub fn cache<C>(self, cache: C) -> SessionManagerBuilder<MemorySessionStore<C>>
    where
        C: Cache<SessionId, Session> + 'static,
    {
        self.store(MemorySessionStore::with_cache(cache))
    }

    /// What the sweep does when it falls behind schedule.
    pub fn missed_sweep(mut self, policy: MissedSweepPolicy) -> Self {
        self.missed_sweep = policy;
        self
    }

    /// Random delay added to the first sweep.
    pub fn sweep_jitter(mut self, jitter: Duration) -> Self {
        self.sweep_jitter = jitter;
        self
    }

    /// Size of the per-session lock table.
    pub fn lock_stripes(mut self, stripes: usize) -> Self {
        self.lock_stripes = stripes;
        self
    }

    /// Assembles the manager. The sweep is not started until the first
    /// session is, so this doesn't need a running runtime.
    pub fn build(self) -> SessionManager<S> {
        let config = self.config.validated();
        let (events, _) = broadcast::channel(config.event_channel_capacity);
        let sweep = SweepConfig {
            interval: config.validation_interval,
            missed_sweep: self.missed_sweep,
            initial_jitter: self.sweep_jitter,
        };

        debug!(
            timeout_ms = config.global_session_timeout.as_millis() as u64,
            validation = config.validation_scheduler_enabled,
            "session manager configured"
        );

        let core = Arc::new(ManagerCore {
            store: self.store,
            config,
            events,
            locks: SessionLocks::new(self.lock_stripes),
        });
        let scheduler = ValidationScheduler::new(Arc::clone(&core), sweep);

        SessionManager { core, scheduler }
    }
}
