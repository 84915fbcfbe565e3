//! Session storage for Warden.
//!
//! - **Contract**: [`SessionStore`]: create, read, update, delete, and a
//!   snapshot of everything stored
//! - **Caching**: [`Cache`] capability with an unbounded [`MapCache`]
//!   default
//! - **Reference store**: [`MemorySessionStore`], process-local and routed
//!   through whichever cache it was given
//!
//! A production deployment implements [`SessionStore`] against a database
//! or distributed cache; the manager doesn't change.

mod cache;
mod error;
mod memory;
mod store;

pub use cache::{Cache, MapCache};
pub use error::CacheError;
pub use memory::{ACTIVE_SESSIONS_CACHE, MemorySessionStore};
pub use store::SessionStore;
