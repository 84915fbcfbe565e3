//! # Warden
//!
//! Session lifecycle management with validation on every access.
//!
//! A [`SessionManager`] hands out session ids, and every later call that
//! names an id first checks that the session is still usable. Sessions end
//! in one of two ways: the application stops them, or they sit idle past
//! their timeout and expire. Idle sessions are caught either by the next
//! access or by a background sweep, whichever comes first.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use warden::prelude::*;
//!
//! # async fn demo() -> Result<(), WardenError> {
//! warden::init_tracing("warden=debug,info")?;
//!
//! let manager = SessionManager::builder().build();
//! let id = manager.start("10.0.0.1".parse().ok()).await?;
//!
//! manager.set_attribute(&id, "user", serde_json::json!("alice")).await?;
//! manager.touch(&id).await?;
//! manager.stop(&id).await?;
//!
//! manager.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Crates
//!
//! - `warden-session`: the session entity, validation rule, errors
//! - `warden-store`: the store contract and the in-memory store
//! - `warden-sweep`: the background validation scheduler
//! - `warden` (this crate): the manager that ties them together

mod error;
mod locks;
mod manager;
mod telemetry;

pub use error::WardenError;
pub use manager::{SessionManager, SessionManagerBuilder};
pub use telemetry::init_tracing;

pub use warden_session::{
    DEFAULT_GLOBAL_SESSION_TIMEOUT, DEFAULT_VALIDATION_INTERVAL, InvalidSession, Session,
    SessionConfig, SessionError, SessionEvent, SessionId, SessionState, Verdict, judge,
};
pub use warden_store::{
    ACTIVE_SESSIONS_CACHE, Cache, CacheError, MapCache, MemorySessionStore, SessionStore,
};
pub use warden_sweep::{
    MissedSweepPolicy, SessionValidator, SweepConfig, SweepMetrics, SweepReport,
    ValidationScheduler,
};

/// Everything most applications need, in one import.
pub mod prelude {
    pub use crate::{
        InvalidSession, MissedSweepPolicy, Session, SessionConfig, SessionError, SessionEvent,
        SessionId, SessionManager, SessionManagerBuilder, SessionState, SessionStore,
        SweepReport, WardenError,
    };
}
