//! Exchange link client.
//!
//! Maintains one outbound WebSocket connection to an exchange market-data
//! endpoint: heartbeats while connected, exponential-backoff reconnection on
//! abnormal loss, and transparent replay of the subscription ledger after
//! every successful reconnect.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, timeout, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::config::LinkConfig;
use crate::error::LinkError;
use crate::events::{EventPublisher, LinkEvent};
use crate::frames::{ControlFrame, InboundFrame};
use crate::normalizer::normalize;
use crate::state::{reconnect_delay, LinkState, LinkStatus};
use crate::subscriptions::{SubscriptionLedger, SubscriptionRequest};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// State shared between the link handle and its background tasks.
struct LinkShared {
    config: LinkConfig,
    status: RwLock<LinkStatus>,
    ledger: RwLock<SubscriptionLedger>,
    sink: Mutex<Option<WsSink>>,
    events: EventPublisher,
    conn_shutdown: Mutex<Option<mpsc::Sender<()>>>,
    reconnect_task: Mutex<Option<JoinHandle<()>>>,
    // Cleared by an intentional disconnect so a racing loss handler cannot
    // re-engage reconnection afterwards.
    auto_reconnect: AtomicBool,
}

/// Resilient exchange market-data link.
///
/// Cloning returns another handle to the same link.
#[derive(Clone)]
pub struct ExchangeLink {
    shared: Arc<LinkShared>,
}

impl ExchangeLink {
    /// Creates a new exchange link with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: LinkConfig) -> Result<Self, LinkError> {
        config.validate()?;

        Ok(Self {
            shared: Arc::new(LinkShared {
                config,
                status: RwLock::new(LinkStatus::new()),
                ledger: RwLock::new(SubscriptionLedger::new()),
                sink: Mutex::new(None),
                events: EventPublisher::default(),
                conn_shutdown: Mutex::new(None),
                reconnect_task: Mutex::new(None),
                auto_reconnect: AtomicBool::new(false),
            }),
        })
    }

    /// Returns the link configuration.
    #[must_use]
    pub fn config(&self) -> &LinkConfig {
        &self.shared.config
    }

    /// Subscribes a new listener to link events.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<LinkEvent> {
        self.shared.events.subscribe()
    }

    /// Returns the current connection state.
    pub async fn state(&self) -> LinkState {
        self.shared.status.read().await.state
    }

    /// Returns true if connected.
    pub async fn is_connected(&self) -> bool {
        self.shared.status.read().await.state.is_connected()
    }

    /// Returns the consecutive reconnection attempts since the last
    /// successful connect.
    pub async fn reconnect_attempts(&self) -> u32 {
        self.shared.status.read().await.reconnect_attempts
    }

    /// Returns the current subscription ledger entries.
    pub async fn subscriptions(&self) -> Vec<SubscriptionRequest> {
        self.shared.ledger.read().await.entries()
    }

    /// Connects to the exchange endpoint.
    ///
    /// No-op when already connected or connecting. On failure the request is
    /// rejected and the standard reconnect path is engaged.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection attempt fails or times out.
    pub async fn connect(&self) -> Result<(), LinkError> {
        {
            let status = self.shared.status.read().await;
            if matches!(status.state, LinkState::Connected | LinkState::Connecting) {
                return Ok(());
            }
        }

        self.shared.auto_reconnect.store(true, Ordering::SeqCst);

        // A manual connect supersedes any pending automatic retry; if the
        // aborted driver was mid-attempt, reset its transient state.
        if let Some(handle) = self.shared.reconnect_task.lock().await.take() {
            handle.abort();
            let mut status = self.shared.status.write().await;
            if status.state.is_transitioning() {
                status.mark_disconnected();
            }
        }

        match try_connect(&self.shared).await {
            Ok(()) => Ok(()),
            Err(error) => {
                schedule_reconnect(Arc::clone(&self.shared)).await;
                Err(error)
            }
        }
    }

    /// Disconnects intentionally.
    ///
    /// Stops the heartbeat and any pending reconnect; the subscription
    /// ledger is preserved and will be replayed by a later `connect()`.
    pub async fn disconnect(&self) {
        self.shared.auto_reconnect.store(false, Ordering::SeqCst);

        if let Some(handle) = self.shared.reconnect_task.lock().await.take() {
            handle.abort();
        }

        if let Some(shutdown) = self.shared.conn_shutdown.lock().await.take() {
            let _ = shutdown.send(()).await;
        }

        self.shared.status.write().await.mark_disconnected();
        self.shared.events.publish(LinkEvent::Disconnected {
            code: None,
            reason: "client disconnect".to_string(),
        });

        info!("exchange link disconnected");
    }

    /// Subscribes to a feed.
    ///
    /// The ledger is updated first so the intent survives connection loss;
    /// the control frame is only sent when currently connected.
    ///
    /// # Errors
    ///
    /// Returns an error if the link is connected and the send fails.
    pub async fn subscribe(&self, request: SubscriptionRequest) -> Result<(), LinkError> {
        if !self.shared.ledger.write().await.add(request.clone()) {
            return Ok(());
        }

        if self.shared.status.read().await.state.is_connected() {
            send_frame(
                &self.shared,
                &ControlFrame::subscribe(vec![request.wire_arg()]),
            )
            .await?;
        }

        Ok(())
    }

    /// Unsubscribes from a feed.
    ///
    /// # Errors
    ///
    /// Returns an error if the link is connected and the send fails.
    pub async fn unsubscribe(&self, request: &SubscriptionRequest) -> Result<(), LinkError> {
        if !self.shared.ledger.write().await.remove(request) {
            return Ok(());
        }

        if self.shared.status.read().await.state.is_connected() {
            send_frame(
                &self.shared,
                &ControlFrame::unsubscribe(vec![request.wire_arg()]),
            )
            .await?;
        }

        Ok(())
    }

    /// Subscribes to ticker updates for a symbol.
    ///
    /// # Errors
    ///
    /// Returns an error if the link is connected and the send fails.
    pub async fn subscribe_ticker(&self, symbol: impl Into<String>) -> Result<(), LinkError> {
        self.subscribe(SubscriptionRequest::ticker(symbol)).await
    }

    /// Subscribes to the public trade stream for a symbol.
    ///
    /// # Errors
    ///
    /// Returns an error if the link is connected and the send fails.
    pub async fn subscribe_trades(&self, symbol: impl Into<String>) -> Result<(), LinkError> {
        self.subscribe(SubscriptionRequest::trades(symbol)).await
    }

    /// Subscribes to order book updates for a symbol.
    ///
    /// # Errors
    ///
    /// Returns an error if the link is connected and the send fails.
    pub async fn subscribe_orderbook(
        &self,
        symbol: impl Into<String>,
        depth: u32,
    ) -> Result<(), LinkError> {
        self.subscribe(SubscriptionRequest::orderbook(symbol, depth))
            .await
    }

    /// Subscribes to kline updates for a symbol.
    ///
    /// # Errors
    ///
    /// Returns an error if the link is connected and the send fails.
    pub async fn subscribe_kline(
        &self,
        symbol: impl Into<String>,
        interval: impl Into<String>,
    ) -> Result<(), LinkError> {
        self.subscribe(SubscriptionRequest::kline(symbol, interval))
            .await
    }
}

/// Serializes a control frame and writes it to the active sink.
///
/// # Errors
///
/// Returns [`LinkError::Serialization`] if the frame cannot be encoded,
/// [`LinkError::NotConnected`] if no sink is currently open, and
/// [`LinkError::SendFailed`] if the write fails.
async fn send_frame(shared: &Arc<LinkShared>, frame: &ControlFrame) -> Result<(), LinkError> {
    let text =
        serde_json::to_string(frame).map_err(|error| LinkError::Serialization(error.to_string()))?;

    let mut guard = shared.sink.lock().await;
    let sink = guard.as_mut().ok_or(LinkError::NotConnected)?;
    sink.send(Message::Text(text.into()))
        .await
        .map_err(|error| LinkError::SendFailed(error.to_string()))
}

/// Opens the transport and, on success, starts the connection tasks.
async fn try_connect(shared: &Arc<LinkShared>) -> Result<(), LinkError> {
    {
        let mut status = shared.status.write().await;
        if matches!(status.state, LinkState::Connected | LinkState::Connecting) {
            return Ok(());
        }
        status.mark_connecting();
    }

    let connecting = connect_async(shared.config.url.as_str());
    let (stream, _response) = match timeout(shared.config.connect_timeout, connecting).await {
        Ok(Ok(pair)) => pair,
        Ok(Err(error)) => {
            shared.status.write().await.mark_disconnected();
            return Err(LinkError::Connection(error.to_string()));
        }
        Err(_) => {
            shared.status.write().await.mark_disconnected();
            let timeout_ms = shared.config.connect_timeout.as_millis() as u64;
            return Err(LinkError::ConnectTimeout(timeout_ms));
        }
    };

    let (sink, source) = stream.split();
    *shared.sink.lock().await = Some(sink);

    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    *shared.conn_shutdown.lock().await = Some(shutdown_tx);

    shared.status.write().await.mark_connected();
    shared.events.publish(LinkEvent::Connected);
    info!(url = %shared.config.url, environment = %shared.config.environment, "exchange link connected");

    tokio::spawn(run_connection(Arc::clone(shared), source, shutdown_rx));
    tokio::spawn(replay_subscriptions(Arc::clone(shared)));

    Ok(())
}

/// Replays every ledger entry, pacing sends to avoid flooding the endpoint.
async fn replay_subscriptions(shared: Arc<LinkShared>) {
    let entries = shared.ledger.read().await.entries();
    if entries.is_empty() {
        return;
    }

    debug!(count = entries.len(), "replaying subscriptions");

    for request in entries {
        if !shared.status.read().await.state.is_connected() {
            return;
        }

        let arg = request.wire_arg();
        if let Err(error) = send_frame(&shared, &ControlFrame::subscribe(vec![arg.clone()])).await {
            warn!(error = %error, arg = %arg, "failed to replay subscription");
            return;
        }

        sleep(shared.config.replay_delay).await;
    }
}

/// Connection task: pumps inbound frames and drives the heartbeat until the
/// link is shut down or lost.
async fn run_connection(
    shared: Arc<LinkShared>,
    mut source: WsSource,
    mut shutdown_rx: mpsc::Receiver<()>,
) {
    let mut heartbeat = interval(shared.config.heartbeat_interval);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick of a fresh interval completes immediately.
    heartbeat.tick().await;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                debug!("link shutdown signal received");
                if let Some(mut sink) = shared.sink.lock().await.take() {
                    let _ = sink.close().await;
                }
                return;
            }

            _ = heartbeat.tick() => {
                shared.status.write().await.record_ping();
                if let Err(error) = send_frame(&shared, &ControlFrame::ping()).await {
                    warn!(error = %error, "failed to send heartbeat");
                }
            }

            frame = source.next() => {
                match frame {
                    Some(Ok(message)) => {
                        if let Some((code, reason)) = handle_message(&shared, message).await {
                            connection_lost(shared, code, reason).await;
                            return;
                        }
                    }
                    Some(Err(error)) => {
                        shared.events.publish(LinkEvent::Error(error.to_string()));
                        connection_lost(shared, None, error.to_string()).await;
                        return;
                    }
                    None => {
                        connection_lost(shared, None, "stream ended".to_string()).await;
                        return;
                    }
                }
            }
        }
    }
}

/// Handles one inbound message; returns close details when the peer closed.
async fn handle_message(
    shared: &Arc<LinkShared>,
    message: Message,
) -> Option<(Option<u16>, String)> {
    match message {
        Message::Text(text) => {
            handle_text(shared, text.as_str()).await;
            None
        }
        Message::Pong(_) => {
            shared.status.write().await.record_pong();
            None
        }
        Message::Close(frame) => Some(match frame {
            Some(frame) => (Some(u16::from(frame.code)), frame.reason.to_string()),
            None => (None, String::new()),
        }),
        // Pings are answered by the protocol layer; binary frames are not
        // part of this feed.
        _ => None,
    }
}

/// Decodes one text frame; parse failures are logged and dropped.
async fn handle_text(shared: &Arc<LinkShared>, text: &str) {
    let frame = match InboundFrame::parse(text) {
        Ok(frame) => frame,
        Err(error) => {
            warn!(error = %error, "dropping unparsable frame");
            return;
        }
    };

    if frame.is_pong() {
        shared.status.write().await.record_pong();
        return;
    }

    match frame {
        InboundFrame::Ack {
            success, ret_msg, ..
        } => {
            if success {
                debug!(ret_msg = ret_msg.as_deref().unwrap_or(""), "request acknowledged");
            } else {
                warn!(ret_msg = ret_msg.as_deref().unwrap_or(""), "request rejected by exchange");
            }
        }
        InboundFrame::Data { topic, data, ts } => {
            for event in normalize(&shared.config.exchange_id, &topic, &data, ts) {
                shared.events.publish(LinkEvent::MarketData(event));
            }
        }
        InboundFrame::Other(value) => {
            debug!(frame = %value, "ignoring unrecognized frame");
        }
    }
}

/// Abnormal loss path: publish the event and engage reconnection.
async fn connection_lost(shared: Arc<LinkShared>, code: Option<u16>, reason: String) {
    *shared.sink.lock().await = None;
    *shared.conn_shutdown.lock().await = None;

    warn!(?code, reason = %reason, "exchange link lost");
    shared.events.publish(LinkEvent::Disconnected { code, reason });

    schedule_reconnect(shared).await;
}

/// Starts the reconnect driver unless one is already running.
async fn schedule_reconnect(shared: Arc<LinkShared>) {
    let mut task = shared.reconnect_task.lock().await;
    if let Some(handle) = task.as_ref() {
        if !handle.is_finished() {
            return;
        }
    }
    *task = Some(tokio::spawn(run_reconnect(Arc::clone(&shared))));
}

/// Reconnect driver: one backoff timer at a time, terminating either on a
/// successful connect or when the attempt ceiling is reached.
///
/// Returns a boxed future with a declared `Send` bound so the reconnect/connect
/// task cycle (`run_reconnect` awaits `try_connect`, which spawns the
/// connection task that can re-enter `run_reconnect`) does not force rustc to
/// resolve an opaque future type within its own defining scope.
fn run_reconnect(
    shared: Arc<LinkShared>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> {
    Box::pin(async move {
        loop {
            if !shared.auto_reconnect.load(Ordering::SeqCst) {
                return;
            }

            let (attempt, give_up) = {
                let mut status = shared.status.write().await;
                if status.reconnect_attempts >= shared.config.max_reconnect_attempts {
                    status.mark_disconnected();
                    (status.reconnect_attempts, true)
                } else {
                    status.mark_reconnecting();
                    (status.reconnect_attempts, false)
                }
            };

            if give_up {
                warn!(attempts = attempt, "max reconnect attempts reached, giving up");
                shared
                    .events
                    .publish(LinkEvent::MaxReconnectAttemptsReached { attempts: attempt });
                return;
            }

            let delay = reconnect_delay(shared.config.base_reconnect_delay, attempt);
            debug!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                "scheduling reconnect"
            );
            sleep(delay).await;

            match try_connect(&shared).await {
                Ok(()) => return,
                Err(error) => {
                    warn!(error = %error, attempt, "reconnect attempt failed");
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;

    fn test_config() -> LinkConfig {
        LinkConfig::new(Environment::Sandbox).with_url("ws://127.0.0.1:1/stream")
    }

    #[test]
    fn test_link_new() {
        let link = ExchangeLink::new(test_config());
        assert!(link.is_ok());
    }

    #[test]
    fn test_link_new_invalid_config() {
        let config = test_config().with_url("");
        assert!(ExchangeLink::new(config).is_err());
    }

    #[tokio::test]
    async fn test_link_initial_state() {
        let link = ExchangeLink::new(test_config()).expect("link");
        assert_eq!(link.state().await, LinkState::Disconnected);
        assert!(!link.is_connected().await);
        assert_eq!(link.reconnect_attempts().await, 0);
    }

    #[tokio::test]
    async fn test_subscribe_while_disconnected_records_intent() {
        let link = ExchangeLink::new(test_config()).expect("link");

        link.subscribe_ticker("BTCUSDT").await.expect("subscribe");
        link.subscribe_trades("ETHUSDT").await.expect("subscribe");

        let subscriptions = link.subscriptions().await;
        assert_eq!(subscriptions.len(), 2);
        assert_eq!(subscriptions[0].wire_arg(), "tickers.BTCUSDT");
        assert_eq!(subscriptions[1].wire_arg(), "publicTrade.ETHUSDT");
    }

    #[tokio::test]
    async fn test_subscribe_idempotent_while_disconnected() {
        let link = ExchangeLink::new(test_config()).expect("link");

        link.subscribe_ticker("BTCUSDT").await.expect("subscribe");
        link.subscribe_ticker("BTCUSDT").await.expect("subscribe");

        assert_eq!(link.subscriptions().await.len(), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_removes_ledger_entry() {
        let link = ExchangeLink::new(test_config()).expect("link");

        link.subscribe_ticker("BTCUSDT").await.expect("subscribe");
        link.unsubscribe(&SubscriptionRequest::ticker("BTCUSDT"))
            .await
            .expect("unsubscribe");

        assert!(link.subscriptions().await.is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_preserves_ledger() {
        let link = ExchangeLink::new(test_config()).expect("link");

        link.subscribe_kline("BTCUSDT", "5").await.expect("subscribe");
        link.disconnect().await;

        assert_eq!(link.state().await, LinkState::Disconnected);
        assert_eq!(link.subscriptions().await.len(), 1);
    }
}
