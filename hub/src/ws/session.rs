//! Sessions and the session registry.
//!
//! A session exists in the registry exactly while its transport is open and
//! within the liveness timeout. The registry owns all session state; other
//! components reach sessions only through hub operations.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::channels::Channel;
use super::messages::ServerMessage;

/// Unique session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Generates a new unique session ID.
    #[must_use]
    pub fn generate() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the inner ID value.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sess-{}", self.0)
    }
}

/// Item on a session's outbound queue.
#[derive(Debug, Clone)]
pub enum Outbound {
    /// A protocol message to serialize and send.
    Message(ServerMessage),
    /// A low-level liveness probe (WebSocket ping).
    Probe,
}

/// One authenticated connection.
#[derive(Debug)]
pub struct Session {
    /// Session identifier.
    pub id: SessionId,
    /// Owning user.
    pub user_id: u64,
    /// User-facing identifier.
    pub email: String,
    /// Connection time.
    pub connected_at: DateTime<Utc>,
    /// Last liveness signal (inbound control message or heartbeat reply).
    pub last_heartbeat: Instant,
    /// Subscribed channels.
    pub subscriptions: HashSet<Channel>,
    /// Outbound queue sender.
    pub sender: mpsc::Sender<Outbound>,
}

impl Session {
    /// Creates a new session.
    #[must_use]
    pub fn new(user_id: u64, email: impl Into<String>, sender: mpsc::Sender<Outbound>) -> Self {
        Self {
            id: SessionId::generate(),
            user_id,
            email: email.into(),
            connected_at: Utc::now(),
            last_heartbeat: Instant::now(),
            subscriptions: HashSet::new(),
            sender,
        }
    }

    /// Refreshes the liveness timestamp.
    pub fn touch(&mut self) {
        self.last_heartbeat = Instant::now();
    }

    /// Returns true if the session exceeded the liveness timeout.
    #[must_use]
    pub fn is_stale(&self, timeout: Duration) -> bool {
        self.last_heartbeat.elapsed() > timeout
    }

    /// Adds a channel subscription. Returns false if already subscribed.
    pub fn subscribe(&mut self, channel: Channel) -> bool {
        self.subscriptions.insert(channel)
    }

    /// Removes a channel subscription. Returns false if not subscribed.
    pub fn unsubscribe(&mut self, channel: Channel) -> bool {
        self.subscriptions.remove(&channel)
    }

    /// Returns true if subscribed to the channel.
    #[must_use]
    pub fn is_subscribed(&self, channel: Channel) -> bool {
        self.subscriptions.contains(&channel)
    }
}

/// Registry of all open sessions.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: tokio::sync::RwLock<HashMap<SessionId, Session>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a session unless the owning user is at the session cap.
    ///
    /// Returns false (without inserting) when the cap is hit.
    pub async fn insert_with_cap(&self, session: Session, max_per_user: u32) -> bool {
        let mut sessions = self.sessions.write().await;
        let open = sessions
            .values()
            .filter(|existing| existing.user_id == session.user_id)
            .count();
        if open >= max_per_user as usize {
            return false;
        }
        sessions.insert(session.id, session);
        true
    }

    /// Removes a session, returning it when present.
    pub async fn remove(&self, id: SessionId) -> Option<Session> {
        self.sessions.write().await.remove(&id)
    }

    /// Returns the number of open sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Returns true if no sessions are open.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Returns all open session ids.
    pub async fn session_ids(&self) -> Vec<SessionId> {
        self.sessions.read().await.keys().copied().collect()
    }

    /// Returns the owning user of a session.
    pub async fn user_of(&self, id: SessionId) -> Option<u64> {
        self.sessions.read().await.get(&id).map(|s| s.user_id)
    }

    /// Refreshes a session's liveness timestamp.
    pub async fn touch(&self, id: SessionId) {
        if let Some(session) = self.sessions.write().await.get_mut(&id) {
            session.touch();
        }
    }

    /// Adds a channel to a session's subscription set.
    pub async fn add_subscription(&self, id: SessionId, channel: Channel) -> bool {
        match self.sessions.write().await.get_mut(&id) {
            Some(session) => session.subscribe(channel),
            None => false,
        }
    }

    /// Removes a channel from a session's subscription set.
    pub async fn remove_subscription(&self, id: SessionId, channel: Channel) -> bool {
        match self.sessions.write().await.get_mut(&id) {
            Some(session) => session.unsubscribe(channel),
            None => false,
        }
    }

    /// Returns the outbound sender for a session.
    pub async fn sender_of(&self, id: SessionId) -> Option<mpsc::Sender<Outbound>> {
        self.sessions.read().await.get(&id).map(|s| s.sender.clone())
    }

    /// Returns the outbound senders for a set of sessions.
    pub async fn senders_for(
        &self,
        ids: &[SessionId],
    ) -> Vec<(SessionId, mpsc::Sender<Outbound>)> {
        let sessions = self.sessions.read().await;
        ids.iter()
            .filter_map(|id| sessions.get(id).map(|s| (*id, s.sender.clone())))
            .collect()
    }

    /// Returns the outbound senders for every session of a user.
    pub async fn senders_for_user(&self, user_id: u64) -> Vec<(SessionId, mpsc::Sender<Outbound>)> {
        let sessions = self.sessions.read().await;
        sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .map(|s| (s.id, s.sender.clone()))
            .collect()
    }

    /// Returns the outbound senders for every open session.
    pub async fn all_senders(&self) -> Vec<(SessionId, mpsc::Sender<Outbound>)> {
        let sessions = self.sessions.read().await;
        sessions.values().map(|s| (s.id, s.sender.clone())).collect()
    }

    /// Returns sessions whose last liveness signal exceeds the timeout.
    pub async fn stale_sessions(&self, timeout: Duration) -> Vec<SessionId> {
        let sessions = self.sessions.read().await;
        sessions
            .values()
            .filter(|s| s.is_stale(timeout))
            .map(|s| s.id)
            .collect()
    }
}
