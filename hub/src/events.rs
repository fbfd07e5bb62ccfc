//! Hub events.
//!
//! The hub publishes a fixed set of event kinds over a broadcast channel so
//! external collaborators (bot-command interpreters, monitors) can observe
//! session activity without reaching into hub state.

use serde_json::Value;
use tokio::sync::broadcast;

use crate::ws::session::SessionId;

/// Default capacity of the hub event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Event emitted by the connection hub.
#[derive(Debug, Clone, PartialEq)]
pub enum HubEvent {
    /// A session was established.
    SessionConnected {
        /// Session identifier.
        session_id: SessionId,
        /// Owning user.
        user_id: u64,
    },

    /// A session ended.
    SessionDisconnected {
        /// Session identifier.
        session_id: SessionId,
        /// Owning user.
        user_id: u64,
        /// Close reason.
        reason: String,
    },

    /// A session sent a bot command; interpretation is up to the listener.
    CommandReceived {
        /// Session identifier.
        session_id: SessionId,
        /// Owning user.
        user_id: u64,
        /// Opaque command payload.
        data: Value,
    },
}

/// Publisher side of the hub event channel.
#[derive(Debug, Clone)]
pub struct HubEventPublisher {
    sender: broadcast::Sender<HubEvent>,
}

impl HubEventPublisher {
    /// Creates a publisher with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribes a new listener.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<HubEvent> {
        self.sender.subscribe()
    }

    /// Publishes an event. A send with no listeners is not an error.
    pub fn publish(&self, event: HubEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for HubEventPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
