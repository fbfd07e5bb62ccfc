//! The connection hub.
//!
//! Owns the session registry and channel directory, dispatches inbound
//! control messages, and exposes the broadcast surface used by the rest of
//! the platform.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::audit::{AuditEntry, AuditSink, TracingAuditSink};
use crate::auth::Identity;
use crate::config::HubConfig;
use crate::error::HubError;
use crate::events::{HubEvent, HubEventPublisher};

use super::channels::{Channel, ChannelDirectory};
use super::liveness::LivenessHandle;
use super::messages::{ClientMessage, ServerMessage};
use super::metrics::HubMetrics;
use super::session::{Outbound, Session, SessionId, SessionRegistry};

/// Connection hub: session registry, channel directory, and broadcast
/// surface behind one handle.
pub struct ConnectionHub {
    config: HubConfig,
    registry: SessionRegistry,
    directory: ChannelDirectory,
    metrics: Arc<HubMetrics>,
    audit: Arc<dyn AuditSink>,
    events: HubEventPublisher,
    liveness: Mutex<Option<LivenessHandle>>,
}

impl ConnectionHub {
    /// Creates a hub with the default (tracing) audit sink.
    #[must_use]
    pub fn new(config: HubConfig) -> Arc<Self> {
        Self::with_audit_sink(config, Arc::new(TracingAuditSink))
    }

    /// Creates a hub with an injected audit sink.
    #[must_use]
    pub fn with_audit_sink(config: HubConfig, audit: Arc<dyn AuditSink>) -> Arc<Self> {
        Arc::new(Self {
            config,
            registry: SessionRegistry::new(),
            directory: ChannelDirectory::new(),
            metrics: Arc::new(HubMetrics::new()),
            audit,
            events: HubEventPublisher::default(),
            liveness: Mutex::new(None),
        })
    }

    /// Returns the hub configuration.
    #[must_use]
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Returns the hub metrics.
    #[must_use]
    pub fn metrics(&self) -> Arc<HubMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Subscribes a new listener to hub events.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<HubEvent> {
        self.events.subscribe()
    }

    /// Returns the number of open sessions.
    pub async fn session_count(&self) -> usize {
        self.registry.len().await
    }

    /// Returns the number of subscribers for a channel.
    pub async fn subscriber_count(&self, channel: Channel) -> usize {
        self.directory.subscriber_count(channel).await
    }

    /// Registers a session for a verified identity.
    ///
    /// On success the welcome message is already queued on the returned
    /// outbox and the session accepts control messages.
    ///
    /// # Errors
    ///
    /// Returns `HubError::SessionLimit` when the user is at the concurrent
    /// session cap.
    pub async fn register_session(
        &self,
        identity: Identity,
    ) -> Result<(SessionId, mpsc::Receiver<Outbound>), HubError> {
        let (tx, rx) = mpsc::channel(self.config.outbox_capacity);
        let session = Session::new(identity.user_id, identity.email, tx.clone());
        let session_id = session.id;
        let user_id = session.user_id;

        if !self
            .registry
            .insert_with_cap(session, self.config.max_sessions_per_user)
            .await
        {
            self.metrics.record_rejected_upgrade();
            self.record_audit(AuditEntry::error(
                Some(user_id),
                "concurrent session limit reached",
            ))
            .await;
            return Err(HubError::SessionLimit { user_id });
        }

        let _ = tx.send(Outbound::Message(ServerMessage::connection())).await;

        self.metrics.record_session_opened();
        self.record_audit(AuditEntry::connected(user_id, session_id)).await;
        self.events.publish(HubEvent::SessionConnected {
            session_id,
            user_id,
        });

        info!(session = %session_id, user_id, "session connected");
        Ok((session_id, rx))
    }

    /// Records a rejected upgrade (missing or invalid credential).
    pub async fn record_auth_rejected(&self, detail: &str) {
        self.metrics.record_rejected_upgrade();
        self.record_audit(AuditEntry::error(None, detail)).await;
    }

    /// Handles one inbound text frame from a session.
    ///
    /// Any inbound frame counts as a liveness signal. Unparsable or unknown
    /// messages produce an `error` response; the session stays connected.
    pub async fn handle_text(&self, session_id: SessionId, text: &str) {
        self.metrics.record_message_received();
        self.registry.touch(session_id).await;

        match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => self.handle_message(session_id, message).await,
            Err(error) => {
                debug!(session = %session_id, %error, "unparsable client message");
                self.metrics.record_protocol_error();
                self.send_to_session(
                    session_id,
                    ServerMessage::error("invalid_message", format!("invalid message: {error}")),
                )
                .await;
            }
        }
    }

    /// Dispatches one decoded control message.
    pub async fn handle_message(&self, session_id: SessionId, message: ClientMessage) {
        match message {
            ClientMessage::Subscribe { channel } => {
                self.handle_subscribe(session_id, &channel).await;
            }
            ClientMessage::Unsubscribe { channel } => {
                self.handle_unsubscribe(session_id, &channel).await;
            }
            ClientMessage::Ping => {
                self.send_to_session(session_id, ServerMessage::pong()).await;
            }
            ClientMessage::BotCommand { data } => {
                self.send_to_session(session_id, ServerMessage::bot_command_ack())
                    .await;
                if let Some(user_id) = self.registry.user_of(session_id).await {
                    self.events.publish(HubEvent::CommandReceived {
                        session_id,
                        user_id,
                        data,
                    });
                }
            }
            ClientMessage::Unknown => {
                self.metrics.record_protocol_error();
                self.send_to_session(
                    session_id,
                    ServerMessage::error("unsupported_type", "unsupported message type"),
                )
                .await;
            }
        }
    }

    async fn handle_subscribe(&self, session_id: SessionId, channel_name: &str) {
        let Some(channel) = Channel::parse(channel_name) else {
            self.metrics.record_protocol_error();
            self.send_to_session(
                session_id,
                ServerMessage::error("invalid_channel", format!("unknown channel: {channel_name}")),
            )
            .await;
            return;
        };

        self.registry.add_subscription(session_id, channel).await;
        self.directory.subscribe(channel, session_id).await;

        self.send_to_session(session_id, ServerMessage::subscribed(channel))
            .await;
        debug!(session = %session_id, %channel, "subscribed");
    }

    async fn handle_unsubscribe(&self, session_id: SessionId, channel_name: &str) {
        let Some(channel) = Channel::parse(channel_name) else {
            self.metrics.record_protocol_error();
            self.send_to_session(
                session_id,
                ServerMessage::error("invalid_channel", format!("unknown channel: {channel_name}")),
            )
            .await;
            return;
        };

        self.registry.remove_subscription(session_id, channel).await;
        self.directory.unsubscribe(channel, session_id).await;

        self.send_to_session(session_id, ServerMessage::unsubscribed(channel))
            .await;
        debug!(session = %session_id, %channel, "unsubscribed");
    }

    /// Broadcasts a payload to every subscriber of a channel.
    ///
    /// A delivery failure on one session never affects the others; an empty
    /// channel is a no-op. Returns the number of sessions reached.
    pub async fn broadcast(&self, channel: Channel, kind: &str, data: Value) -> usize {
        let subscribers = self.directory.subscribers(channel).await;
        if subscribers.is_empty() {
            return 0;
        }

        self.metrics.record_broadcast();
        let message = ServerMessage::broadcast(kind, channel, data);

        let mut delivered = 0;
        for (session_id, sender) in self.registry.senders_for(&subscribers).await {
            match sender.try_send(Outbound::Message(message.clone())) {
                Ok(()) => {
                    self.metrics.record_message_sent();
                    delivered += 1;
                }
                Err(error) => {
                    self.metrics.record_delivery_failure();
                    warn!(session = %session_id, %channel, %error, "broadcast delivery failed");
                }
            }
        }

        delivered
    }

    /// Delivers a message to every session of a user. Returns the number of
    /// sessions reached (0, 1, or many).
    pub async fn send_to_user(&self, user_id: u64, message: ServerMessage) -> usize {
        let mut delivered = 0;
        for (session_id, sender) in self.registry.senders_for_user(user_id).await {
            match sender.try_send(Outbound::Message(message.clone())) {
                Ok(()) => {
                    self.metrics.record_message_sent();
                    delivered += 1;
                }
                Err(error) => {
                    self.metrics.record_delivery_failure();
                    warn!(session = %session_id, user_id, %error, "user delivery failed");
                }
            }
        }
        delivered
    }

    /// Removes a session from the registry and every channel.
    ///
    /// Safe to call more than once; later calls are no-ops.
    pub async fn disconnect(&self, session_id: SessionId, reason: &str) {
        let Some(session) = self.registry.remove(session_id).await else {
            return;
        };

        self.directory.unsubscribe_all(session_id).await;
        self.metrics.record_session_closed();
        self.record_audit(AuditEntry::disconnected(session.user_id, session_id, reason))
            .await;
        self.events.publish(HubEvent::SessionDisconnected {
            session_id,
            user_id: session.user_id,
            reason: reason.to_string(),
        });

        info!(session = %session_id, user_id = session.user_id, reason, "session disconnected");
    }

    /// Starts the liveness supervisor for this hub.
    pub async fn start_liveness(self: &Arc<Self>) {
        let mut guard = self.liveness.lock().await;
        if guard.is_some() {
            return;
        }
        *guard = Some(LivenessHandle::spawn(Arc::clone(self)));
    }

    /// Sends a liveness probe to every open session.
    pub async fn ping_sweep(&self) {
        for (session_id, sender) in self.registry.all_senders().await {
            if sender.try_send(Outbound::Probe).is_err() {
                debug!(session = %session_id, "probe not queued");
            }
        }
    }

    /// Evicts every session past the liveness timeout.
    pub async fn eviction_sweep(&self) {
        let stale = self
            .registry
            .stale_sessions(self.config.liveness_timeout)
            .await;

        for session_id in stale {
            warn!(session = %session_id, "evicting unresponsive session");
            self.metrics.record_eviction();
            self.disconnect(session_id, "liveness timeout").await;
        }
    }

    /// Refreshes a session's liveness timestamp (heartbeat reply path).
    pub async fn touch(&self, session_id: SessionId) {
        self.registry.touch(session_id).await;
    }

    /// Shuts the hub down: notifies and closes every session and stops the
    /// liveness supervisor.
    pub async fn shutdown(&self) {
        info!("hub shutting down");

        if let Some(handle) = self.liveness.lock().await.take() {
            handle.stop().await;
        }

        for session_id in self.registry.session_ids().await {
            self.send_to_session(
                session_id,
                ServerMessage::error("server_shutdown", "server shutting down"),
            )
            .await;
            self.disconnect(session_id, "server shutting down").await;
        }
    }

    /// Queues a message on one session's outbox.
    async fn send_to_session(&self, session_id: SessionId, message: ServerMessage) {
        let Some(sender) = self.registry.sender_of(session_id).await else {
            return;
        };
        if sender.send(Outbound::Message(message)).await.is_ok() {
            self.metrics.record_message_sent();
        }
    }

    /// Best-effort audit write; failures must not affect hub behavior.
    async fn record_audit(&self, entry: AuditEntry) {
        if let Err(error) = self.audit.record(entry).await {
            warn!(%error, "audit write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::messages::Response;
    use super::*;
    use serde_json::json;

    fn test_hub() -> Arc<ConnectionHub> {
        ConnectionHub::new(HubConfig::default())
    }

    async fn connect(hub: &ConnectionHub, user_id: u64) -> (SessionId, mpsc::Receiver<Outbound>) {
        let identity = Identity::new(user_id, format!("user{user_id}@example.com"));
        hub.register_session(identity).await.expect("session")
    }

    async fn next_message(rx: &mut mpsc::Receiver<Outbound>) -> ServerMessage {
        loop {
            match rx.recv().await.expect("outbound") {
                Outbound::Message(message) => return message,
                Outbound::Probe => continue,
            }
        }
    }

    #[tokio::test]
    async fn test_register_sends_welcome() {
        let hub = test_hub();
        let (_, mut rx) = connect(&hub, 1).await;

        let welcome = next_message(&mut rx).await;
        assert_eq!(welcome, ServerMessage::connection());
        assert_eq!(hub.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_session_cap_rejects_sixth_session() {
        let hub = test_hub();

        let mut outboxes = Vec::new();
        for _ in 0..5 {
            outboxes.push(connect(&hub, 1).await);
        }

        let identity = Identity::new(1, "user1@example.com");
        let result = hub.register_session(identity).await;
        assert!(matches!(result, Err(HubError::SessionLimit { user_id: 1 })));

        // A different user is unaffected.
        let identity = Identity::new(2, "user2@example.com");
        assert!(hub.register_session(identity).await.is_ok());
    }

    #[tokio::test]
    async fn test_subscribe_is_idempotent() {
        let hub = test_hub();
        let (session_id, mut rx) = connect(&hub, 1).await;
        let _ = next_message(&mut rx).await;

        hub.handle_text(session_id, r#"{"type":"subscribe","channel":"bot-status"}"#)
            .await;
        hub.handle_text(session_id, r#"{"type":"subscribe","channel":"bot-status"}"#)
            .await;

        assert_eq!(hub.subscriber_count(Channel::BotStatus).await, 1);
    }

    #[tokio::test]
    async fn test_broadcast_scoped_to_channel() {
        let hub = test_hub();
        let (alerts_session, mut alerts_rx) = connect(&hub, 1).await;
        let (signals_session, mut signals_rx) = connect(&hub, 2).await;
        let _ = next_message(&mut alerts_rx).await;
        let _ = next_message(&mut signals_rx).await;

        hub.handle_message(
            alerts_session,
            ClientMessage::Subscribe {
                channel: "alerts".to_string(),
            },
        )
        .await;
        hub.handle_message(
            signals_session,
            ClientMessage::Subscribe {
                channel: "signals".to_string(),
            },
        )
        .await;
        let _ = next_message(&mut alerts_rx).await;
        let _ = next_message(&mut signals_rx).await;

        let delivered = hub
            .broadcast(Channel::Alerts, "data", json!({"alertId": "a1"}))
            .await;
        assert_eq!(delivered, 1);

        let received = next_message(&mut alerts_rx).await;
        assert_eq!(
            received,
            ServerMessage::broadcast("data", Channel::Alerts, json!({"alertId": "a1"}))
        );

        // The signals-only session got nothing beyond its confirmation.
        assert!(signals_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broadcast_empty_channel_is_noop() {
        let hub = test_hub();
        let delivered = hub
            .broadcast(Channel::TimeSync, "data", json!({"now": 0}))
            .await;
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_invalid_channel_gets_error_and_session_survives() {
        let hub = test_hub();
        let (session_id, mut rx) = connect(&hub, 1).await;
        let _ = next_message(&mut rx).await;

        hub.handle_text(
            session_id,
            r#"{"type":"subscribe","channel":"not-a-real-channel"}"#,
        )
        .await;

        match next_message(&mut rx).await {
            ServerMessage::Response(Response::Error { data }) => {
                assert_eq!(data.code, "invalid_channel");
            }
            other => panic!("expected error, got {other:?}"),
        }

        // The session is still connected and serviceable.
        hub.handle_text(session_id, r#"{"type":"ping"}"#).await;
        assert_eq!(next_message(&mut rx).await, ServerMessage::pong());
        assert_eq!(hub.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_unknown_message_kind_gets_error() {
        let hub = test_hub();
        let (session_id, mut rx) = connect(&hub, 1).await;
        let _ = next_message(&mut rx).await;

        hub.handle_text(session_id, r#"{"type":"teleport"}"#).await;

        match next_message(&mut rx).await {
            ServerMessage::Response(Response::Error { data }) => {
                assert_eq!(data.code, "unsupported_type");
            }
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_bot_command_acked_and_published() {
        let hub = test_hub();
        let mut events = hub.events();
        let (session_id, mut rx) = connect(&hub, 7).await;
        let _ = next_message(&mut rx).await;
        // Drain the connect event.
        let _ = events.recv().await.expect("event");

        hub.handle_text(
            session_id,
            r#"{"type":"bot_command","data":{"action":"pause"}}"#,
        )
        .await;

        assert_eq!(next_message(&mut rx).await, ServerMessage::bot_command_ack());
        match events.recv().await.expect("event") {
            HubEvent::CommandReceived { user_id, data, .. } => {
                assert_eq!(user_id, 7);
                assert_eq!(data["action"], "pause");
            }
            other => panic!("expected command, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_disconnect_cleans_directory() {
        let hub = test_hub();
        let (session_id, mut rx) = connect(&hub, 1).await;
        let _ = next_message(&mut rx).await;

        hub.handle_message(
            session_id,
            ClientMessage::Subscribe {
                channel: "alerts".to_string(),
            },
        )
        .await;
        hub.handle_message(
            session_id,
            ClientMessage::Subscribe {
                channel: "signals".to_string(),
            },
        )
        .await;

        hub.disconnect(session_id, "test close").await;

        assert_eq!(hub.session_count().await, 0);
        assert_eq!(hub.subscriber_count(Channel::Alerts).await, 0);
        assert_eq!(hub.subscriber_count(Channel::Signals).await, 0);
        assert_eq!(hub.metrics().active_sessions(), 0);

        // Idempotent.
        hub.disconnect(session_id, "test close").await;
        assert_eq!(hub.metrics().sessions_closed(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_eviction_sweep_removes_silent_sessions() {
        let hub = test_hub();
        let (quiet, _quiet_rx) = connect(&hub, 1).await;
        let (chatty, _chatty_rx) = connect(&hub, 2).await;

        tokio::time::advance(std::time::Duration::from_secs(45)).await;
        // One session keeps signaling liveness.
        hub.touch(chatty).await;

        tokio::time::advance(std::time::Duration::from_secs(20)).await;
        hub.eviction_sweep().await;

        assert_eq!(hub.session_count().await, 1);
        assert_eq!(hub.metrics().evictions(), 1);
        assert!(hub.registry.user_of(quiet).await.is_none());
        assert!(hub.registry.user_of(chatty).await.is_some());
    }

    #[tokio::test]
    async fn test_send_to_user_reaches_all_sessions() {
        let hub = test_hub();
        let (_, mut first_rx) = connect(&hub, 1).await;
        let (_, mut second_rx) = connect(&hub, 1).await;
        let (_, mut other_rx) = connect(&hub, 2).await;
        let _ = next_message(&mut first_rx).await;
        let _ = next_message(&mut second_rx).await;
        let _ = next_message(&mut other_rx).await;

        let delivered = hub.send_to_user(1, ServerMessage::pong()).await;
        assert_eq!(delivered, 2);

        assert_eq!(next_message(&mut first_rx).await, ServerMessage::pong());
        assert_eq!(next_message(&mut second_rx).await, ServerMessage::pong());
        assert!(other_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_shutdown_notifies_and_clears_sessions() {
        let hub = test_hub();
        let (_, mut rx) = connect(&hub, 1).await;
        let _ = next_message(&mut rx).await;

        hub.shutdown().await;

        match next_message(&mut rx).await {
            ServerMessage::Response(Response::Error { data }) => {
                assert_eq!(data.code, "server_shutdown");
            }
            other => panic!("expected shutdown notice, got {other:?}"),
        }
        assert_eq!(hub.session_count().await, 0);
    }
}
