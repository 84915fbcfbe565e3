//! Periodic session validation for Warden.
//!
//! Foreground traffic only validates the sessions it touches. A session
//! that nobody asks about again would sit in the store forever, so the
//! [`ValidationScheduler`] runs a background task that periodically asks a
//! [`SessionValidator`] (the session manager) to judge *every* stored
//! session.
//!
//! The scheduler holds no session state. It is a timer with a lifecycle:
//!
//! ```text
//!   Stopped ──start()──→ Running ──stop()──→ Stopped
//! ```
//!
//! Both transitions are idempotent. `stop()` waits for a sweep that is
//! already in progress, so shutting down the manager never races a sweep
//! against store teardown. Until that wait is over the scheduler still
//! counts as running and refuses to start a second task.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::Rng;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant as TokioInstant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do when a sweep runs longer than the interval and the next one
/// is already overdue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MissedSweepPolicy {
    /// Drop the missed sweeps and stay on the original cadence.
    /// Safest default: a slow store doesn't cause back-to-back sweeps.
    #[default]
    Skip,
    /// Run the missed sweeps immediately, one after another.
    Burst,
    /// Run one sweep now and restart the cadence from here.
    Delay,
}

impl From<MissedSweepPolicy> for MissedTickBehavior {
    fn from(policy: MissedSweepPolicy) -> Self {
        match policy {
            MissedSweepPolicy::Skip => MissedTickBehavior::Skip,
            MissedSweepPolicy::Burst => MissedTickBehavior::Burst,
            MissedSweepPolicy::Delay => MissedTickBehavior::Delay,
        }
    }
}

/// Configuration for the validation scheduler.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Time between sweeps. The first sweep runs one interval after start.
    pub interval: Duration,
    /// Overrun handling.
    pub missed_sweep: MissedSweepPolicy,
    /// Random delay (0..jitter) added to the *first* sweep so that several
    /// nodes sharing one store and started together don't sweep in
    /// lockstep.
    pub initial_jitter: Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60 * 60),
            missed_sweep: MissedSweepPolicy::default(),
            initial_jitter: Duration::ZERO,
        }
    }
}

impl SweepConfig {
    /// Smallest accepted interval. Tokio intervals can't have a zero period.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

    /// Largest accepted interval and initial jitter. Anything longer would
    /// overflow the timer's deadline arithmetic.
    pub const MAX_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    /// Clamp out-of-range values. Called by [`ValidationScheduler::new`].
    pub fn validated(mut self) -> Self {
        if self.interval < Self::MIN_INTERVAL {
            warn!(
                interval_ms = self.interval.as_secs_f64() * 1000.0,
                "sweep interval below minimum, clamping"
            );
            self.interval = Self::MIN_INTERVAL;
        }
        if self.interval > Self::MAX_INTERVAL {
            warn!(
                interval_secs = self.interval.as_secs(),
                "sweep interval above maximum, clamping"
            );
            self.interval = Self::MAX_INTERVAL;
        }
        if self.initial_jitter > Self::MAX_INTERVAL {
            warn!(
                jitter_secs = self.initial_jitter.as_secs(),
                "sweep jitter above maximum, clamping"
            );
            self.initial_jitter = Self::MAX_INTERVAL;
        }
        self
    }

    /// Delay before the first sweep: one interval plus random jitter.
    pub fn first_sweep_delay(&self) -> Duration {
        let jitter = if self.initial_jitter.is_zero() {
            Duration::ZERO
        } else {
            let us = self.initial_jitter.as_micros().min(u64::MAX as u128) as u64;
            Duration::from_micros(rand::rng().random_range(0..us.max(1)))
        };
        self.interval.saturating_add(jitter)
    }
}

// ---------------------------------------------------------------------------
// Validator callback
// ---------------------------------------------------------------------------

/// Outcome of one sweep over the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Sessions judged.
    pub checked: usize,
    /// Sessions this sweep moved to Expired.
    pub expired: usize,
    /// Sessions that couldn't be judged (store errors, vanished records).
    pub failed: usize,
}

/// Something that can validate every session it knows about.
///
/// The session manager implements this; tests use counters. The returned
/// future must be `Send` because it runs on a spawned task. Failures are
/// the validator's problem: it reports them in the [`SweepReport`] instead
/// of returning an error, since one bad session must never stop the
/// schedule.
pub trait SessionValidator: Send + Sync + 'static {
    fn validate_sessions(&self) -> impl Future<Output = SweepReport> + Send;
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Running totals across all sweeps since the scheduler was created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepMetrics {
    pub total_sweeps: u64,
    pub total_checked: u64,
    pub total_expired: u64,
    pub total_failed: u64,
    /// Wall-clock duration of the most recent sweep.
    pub last_sweep: Duration,
    /// Longest sweep observed.
    pub max_sweep: Duration,
}

impl SweepMetrics {
    fn record(&mut self, report: &SweepReport, elapsed: Duration) {
        self.total_sweeps += 1;
        self.total_checked += report.checked as u64;
        self.total_expired += report.expired as u64;
        self.total_failed += report.failed as u64;
        self.last_sweep = elapsed;
        if elapsed > self.max_sweep {
            self.max_sweep = elapsed;
        }
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Handle to the spawned sweep task.
struct Running {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Runs [`SessionValidator::validate_sessions`] on a fixed interval.
///
/// Must be started from within a Tokio runtime. Dropping the scheduler
/// signals the task to exit after its current sweep; call
/// [`stop`](Self::stop) to also wait for it.
pub struct ValidationScheduler<V: SessionValidator> {
    validator: Arc<V>,
    config: SweepConfig,
    /// Held by `stop()` until the old task has exited.
    lifecycle: tokio::sync::Mutex<()>,
    /// Set while `stop()` waits on the old task.
    stopping: AtomicBool,
    running: Mutex<Option<Running>>,
    metrics: Arc<Mutex<SweepMetrics>>,
}

impl<V: SessionValidator> ValidationScheduler<V> {
    /// Creates a stopped scheduler.
    pub fn new(validator: Arc<V>, config: SweepConfig) -> Self {
        let config = config.validated();
        debug!(
            interval_ms = config.interval.as_secs_f64() * 1000.0,
            policy = ?config.missed_sweep,
            "validation scheduler created"
        );
        Self {
            validator,
            config,
            lifecycle: tokio::sync::Mutex::new(()),
            stopping: AtomicBool::new(false),
            running: Mutex::new(None),
            metrics: Arc::new(Mutex::new(SweepMetrics::default())),
        }
    }

    /// Starts the sweep task. Returns `false` if it was already running or
    /// is still being stopped.
    pub fn start(&self) -> bool {
        let Ok(_lifecycle) = self.lifecycle.try_lock() else {
            debug!("validation scheduler busy starting or stopping, not starting");
            return false;
        };

        let mut running = self.running.lock();
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            trace!("validation scheduler already running");
            return false;
        }

        let (shutdown, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(run_sweeps(
            Arc::clone(&self.validator),
            self.config.clone(),
            Arc::clone(&self.metrics),
            shutdown_rx,
        ));
        *running = Some(Running { shutdown, handle });

        info!(
            interval_ms = self.config.interval.as_secs_f64() * 1000.0,
            "session validation started"
        );
        true
    }

    /// Stops the sweep task and waits for it to finish, including any sweep
    /// that is in flight. A no-op when not running.
    pub async fn stop(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        let running = self.running.lock().take();
        let Some(running) = running else {
            return;
        };

        self.stopping.store(true, Ordering::SeqCst);
        // The task may already be gone (e.g. it panicked); that's fine.
        let _ = running.shutdown.send(());
        let joined = running.handle.await;
        self.stopping.store(false, Ordering::SeqCst);

        if let Err(e) = joined {
            warn!(error = %e, "validation task ended abnormally");
        }
        info!("session validation stopped");
    }

    /// Whether the sweep task is alive. A task that has been told to stop
    /// but is finishing its sweep still counts.
    pub fn is_running(&self) -> bool {
        if self.stopping.load(Ordering::SeqCst) {
            return true;
        }
        self.running
            .lock()
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    /// Snapshot of the sweep totals.
    pub fn metrics(&self) -> SweepMetrics {
        self.metrics.lock().clone()
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }
}

impl<V: SessionValidator> Drop for ValidationScheduler<V> {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            let _ = running.shutdown.send(());
        }
    }
}

/// The sweep loop. Runs until `shutdown` fires or its sender is dropped.
///
/// The shutdown branch is only polled between sweeps, so a sweep that has
/// started always runs to completion.
async fn run_sweeps<V: SessionValidator>(
    validator: Arc<V>,
    config: SweepConfig,
    metrics: Arc<Mutex<SweepMetrics>>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let first = TokioInstant::now() + config.first_sweep_delay();
    let mut ticker = time::interval_at(first, config.interval);
    ticker.set_missed_tick_behavior(config.missed_sweep.into());

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                let started = Instant::now();
                let report = validator.validate_sessions().await;
                let elapsed = started.elapsed();

                metrics.lock().record(&report, elapsed);

                if report.expired > 0 || report.failed > 0 {
                    info!(
                        checked = report.checked,
                        expired = report.expired,
                        failed = report.failed,
                        elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                        "validation sweep finished"
                    );
                } else {
                    debug!(
                        checked = report.checked,
                        elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                        "validation sweep finished"
                    );
                }
            }
        }
    }

    debug!("validation task exiting");
}
