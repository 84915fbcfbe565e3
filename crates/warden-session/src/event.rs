//! Lifecycle notifications.

use serde::{Deserialize, Serialize};

use crate::SessionId;

/// Published by the manager after a transition has been persisted.
///
/// Delivery is fire-and-forget: nobody listening, or a listener falling
/// behind, never affects session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEvent {
    /// A new session was created.
    Started(SessionId),
    /// A session was explicitly stopped.
    Stopped(SessionId),
    /// Validation found a session idle past its timeout.
    Expired(SessionId),
}

impl SessionEvent {
    pub fn session_id(&self) -> &SessionId {
        match self {
            Self::Started(id) | Self::Stopped(id) | Self::Expired(id) => id,
        }
    }
}
