//! Exchange link events.
//!
//! The link publishes a fixed set of event kinds over a broadcast channel;
//! listeners subscribe via [`crate::ExchangeLink::events`].

use tokio::sync::broadcast;

use crate::normalizer::MarketEvent;

/// Default capacity of the link event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Event emitted by the exchange link.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// A normalized market data event.
    MarketData(MarketEvent),

    /// The link connected (or reconnected).
    Connected,

    /// The link lost its connection.
    Disconnected {
        /// Close code, when the peer sent one.
        code: Option<u16>,
        /// Close reason or error description.
        reason: String,
    },

    /// A transport or protocol error occurred.
    Error(String),

    /// The configured reconnection attempt ceiling was reached; the link is
    /// terminally disconnected until `connect()` is called again.
    MaxReconnectAttemptsReached {
        /// Number of attempts made.
        attempts: u32,
    },
}

/// Publisher side of the link event channel.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<LinkEvent>,
}

impl EventPublisher {
    /// Creates a publisher with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribes a new listener.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LinkEvent> {
        self.sender.subscribe()
    }

    /// Publishes an event. A send with no listeners is not an error.
    pub fn publish(&self, event: LinkEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_and_receive() {
        let publisher = EventPublisher::default();
        let mut receiver = publisher.subscribe();

        publisher.publish(LinkEvent::Connected);

        let event = receiver.recv().await.expect("event");
        assert_eq!(event, LinkEvent::Connected);
    }

    #[test]
    fn test_publish_without_listeners() {
        let publisher = EventPublisher::default();
        // Must not panic or error.
        publisher.publish(LinkEvent::Error("boom".to_string()));
    }

    #[tokio::test]
    async fn test_multiple_listeners() {
        let publisher = EventPublisher::default();
        let mut first = publisher.subscribe();
        let mut second = publisher.subscribe();

        publisher.publish(LinkEvent::MaxReconnectAttemptsReached { attempts: 10 });

        assert_eq!(
            first.recv().await.expect("event"),
            LinkEvent::MaxReconnectAttemptsReached { attempts: 10 }
        );
        assert_eq!(
            second.recv().await.expect("event"),
            LinkEvent::MaxReconnectAttemptsReached { attempts: 10 }
        );
    }
}
