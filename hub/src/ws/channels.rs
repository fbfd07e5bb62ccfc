//! Broadcast channels and the channel directory.
//!
//! Channels are a fixed enumerated set shared between client and server;
//! the directory tracks which sessions subscribe to each channel.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::session::SessionId;

/// A named broadcast topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Channel {
    /// Platform health signals.
    SystemHealth,
    /// Bot lifecycle and status changes.
    BotStatus,
    /// Alert notifications.
    Alerts,
    /// Trading signals.
    Signals,
    /// Server time synchronization.
    TimeSync,
}

impl Channel {
    /// All valid channels, in the order advertised to clients.
    pub const ALL: [Self; 5] = [
        Self::SystemHealth,
        Self::BotStatus,
        Self::Alerts,
        Self::Signals,
        Self::TimeSync,
    ];

    /// Parses a wire channel name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "system-health" => Some(Self::SystemHealth),
            "bot-status" => Some(Self::BotStatus),
            "alerts" => Some(Self::Alerts),
            "signals" => Some(Self::Signals),
            "time-sync" => Some(Self::TimeSync),
            _ => None,
        }
    }

    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SystemHealth => "system-health",
            Self::BotStatus => "bot-status",
            Self::Alerts => "alerts",
            Self::Signals => "signals",
            Self::TimeSync => "time-sync",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Maps each channel to the sessions currently subscribed to it.
///
/// An entry exists only while its subscriber set is non-empty.
#[derive(Debug, Default)]
pub struct ChannelDirectory {
    subscriptions: RwLock<HashMap<Channel, HashSet<SessionId>>>,
}

impl ChannelDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes a session to a channel. Idempotent.
    pub async fn subscribe(&self, channel: Channel, session_id: SessionId) {
        let mut subs = self.subscriptions.write().await;
        subs.entry(channel).or_default().insert(session_id);
    }

    /// Unsubscribes a session from a channel, dropping the entry when empty.
    pub async fn unsubscribe(&self, channel: Channel, session_id: SessionId) {
        let mut subs = self.subscriptions.write().await;
        if let Some(sessions) = subs.get_mut(&channel) {
            sessions.remove(&session_id);
            if sessions.is_empty() {
                subs.remove(&channel);
            }
        }
    }

    /// Unsubscribes a session from every channel.
    pub async fn unsubscribe_all(&self, session_id: SessionId) {
        let mut subs = self.subscriptions.write().await;
        subs.retain(|_, sessions| {
            sessions.remove(&session_id);
            !sessions.is_empty()
        });
    }

    /// Returns the sessions subscribed to a channel.
    pub async fn subscribers(&self, channel: Channel) -> Vec<SessionId> {
        let subs = self.subscriptions.read().await;
        subs.get(&channel)
            .map(|sessions| sessions.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Returns the number of subscribers for a channel.
    pub async fn subscriber_count(&self, channel: Channel) -> usize {
        let subs = self.subscriptions.read().await;
        subs.get(&channel).map(HashSet::len).unwrap_or(0)
    }

    /// Returns the number of channels with at least one subscriber.
    pub async fn channel_count(&self) -> usize {
        self.subscriptions.read().await.len()
    }
}
