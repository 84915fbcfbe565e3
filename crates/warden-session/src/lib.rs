//! Session entity and validation rules for Warden.
//!
//! This crate is the bottom of the stack. It knows what a session *is* and
//! how to judge one, but not where sessions live or who asks about them:
//!
//! 1. **Entity**: [`Session`], its [`SessionId`] and derived [`SessionState`]
//! 2. **Rules**: [`judge`] decides whether a session is still usable
//! 3. **Errors**: [`SessionError`] / [`InvalidSession`], the closed set of
//!    failures a caller can see
//!
//! # How it fits in the stack
//!
//! ```text
//! Manager (warden)            ← validates on every access, owns the sweep
//!     ↕
//! Store (warden-store)        ← persists and enumerates sessions
//!     ↕
//! Session layer (this crate)  ← entity, state machine, validation rule
//! ```

mod config;
mod error;
mod event;
mod session;
mod validation;

pub use config::{
    DEFAULT_GLOBAL_SESSION_TIMEOUT, DEFAULT_VALIDATION_INTERVAL, SessionConfig,
};
pub use error::{InvalidSession, SessionError};
pub use event::SessionEvent;
pub use session::{Session, SessionId, SessionState};
pub use validation::{Verdict, judge};
