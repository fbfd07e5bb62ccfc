//! End-to-end hub tests over a real listener and WebSocket clients.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use tradewire_hub::{
    router, Channel, ConnectionHub, HubConfig, Identity, StaticTokenVerifier, WsState,
};

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_hub(config: HubConfig) -> (SocketAddr, Arc<ConnectionHub>) {
    let hub = ConnectionHub::new(config);
    let verifier = Arc::new(
        StaticTokenVerifier::new()
            .with_token("alice-token", Identity::new(1, "alice@example.com"))
            .with_token("bob-token", Identity::new(2, "bob@example.com")),
    );

    let app = router(WsState::new(Arc::clone(&hub), verifier));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });

    (addr, hub)
}

async fn connect(addr: SocketAddr, token: &str) -> WsClient {
    let (ws, _) = connect_async(format!("ws://{addr}/ws?token={token}"))
        .await
        .expect("connect");
    ws
}

/// Receives the next JSON text message, skipping transport frames.
async fn recv_json(ws: &mut WsClient) -> Value {
    loop {
        let message = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for message")
            .expect("stream ended")
            .expect("websocket error");
        if let Message::Text(text) = message {
            return serde_json::from_str(text.as_str()).expect("valid json");
        }
    }
}

async fn send_json(ws: &mut WsClient, value: Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .expect("send");
}

/// Receives until a close frame arrives, returning its code.
async fn recv_close_code(ws: &mut WsClient) -> u16 {
    loop {
        let message = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for close");
        match message {
            Some(Ok(Message::Close(Some(frame)))) => return u16::from(frame.code),
            Some(Ok(_)) => continue,
            Some(Err(_)) | None => panic!("stream ended without close frame"),
        }
    }
}

#[tokio::test]
async fn welcome_lists_valid_channels() {
    let (addr, _hub) = start_hub(HubConfig::default()).await;
    let mut ws = connect(addr, "alice-token").await;

    let welcome = recv_json(&mut ws).await;
    assert_eq!(welcome["type"], "connection");

    let channels = welcome["data"]["channels"].as_array().expect("channels");
    let names: Vec<&str> = channels.iter().filter_map(Value::as_str).collect();
    assert_eq!(
        names,
        vec!["system-health", "bot-status", "alerts", "signals", "time-sync"]
    );
}

#[tokio::test]
async fn subscribe_then_broadcast_reaches_subscriber() {
    let (addr, hub) = start_hub(HubConfig::default()).await;
    let mut ws = connect(addr, "alice-token").await;
    let _ = recv_json(&mut ws).await;

    send_json(&mut ws, json!({"type": "subscribe", "channel": "bot-status"})).await;
    let confirmation = recv_json(&mut ws).await;
    assert_eq!(confirmation["type"], "subscribed");
    assert_eq!(confirmation["channel"], "bot-status");

    let delivered = hub
        .broadcast(Channel::BotStatus, "data", json!({"botId": "b1"}))
        .await;
    assert_eq!(delivered, 1);

    let received = recv_json(&mut ws).await;
    assert_eq!(received["type"], "data");
    assert_eq!(received["channel"], "bot-status");
    assert_eq!(received["data"]["botId"], "b1");

    // Exactly one broadcast arrived: the next response is the pong.
    send_json(&mut ws, json!({"type": "ping"})).await;
    assert_eq!(recv_json(&mut ws).await["type"], "pong");
}

#[tokio::test]
async fn broadcast_is_scoped_to_the_channel() {
    let (addr, hub) = start_hub(HubConfig::default()).await;

    let mut alice = connect(addr, "alice-token").await;
    let mut bob = connect(addr, "bob-token").await;
    let _ = recv_json(&mut alice).await;
    let _ = recv_json(&mut bob).await;

    send_json(&mut alice, json!({"type": "subscribe", "channel": "alerts"})).await;
    send_json(&mut bob, json!({"type": "subscribe", "channel": "signals"})).await;
    assert_eq!(recv_json(&mut alice).await["type"], "subscribed");
    assert_eq!(recv_json(&mut bob).await["type"], "subscribed");

    let delivered = hub
        .broadcast(Channel::Alerts, "alert", json!({"alertId": "a1"}))
        .await;
    assert_eq!(delivered, 1);

    let received = recv_json(&mut alice).await;
    assert_eq!(received["type"], "alert");
    assert_eq!(received["channel"], "alerts");

    // Bob never sees the alerts broadcast: his next message is the pong.
    send_json(&mut bob, json!({"type": "ping"})).await;
    assert_eq!(recv_json(&mut bob).await["type"], "pong");
}

#[tokio::test]
async fn invalid_channel_yields_error_and_session_survives() {
    let (addr, _hub) = start_hub(HubConfig::default()).await;
    let mut ws = connect(addr, "alice-token").await;
    let _ = recv_json(&mut ws).await;

    send_json(
        &mut ws,
        json!({"type": "subscribe", "channel": "not-a-real-channel"}),
    )
    .await;

    let error = recv_json(&mut ws).await;
    assert_eq!(error["type"], "error");
    assert_eq!(error["data"]["code"], "invalid_channel");

    // Still connected: a valid ping gets a pong.
    send_json(&mut ws, json!({"type": "ping"})).await;
    assert_eq!(recv_json(&mut ws).await["type"], "pong");
}

#[tokio::test]
async fn unsubscribe_stops_delivery() {
    let (addr, hub) = start_hub(HubConfig::default()).await;
    let mut ws = connect(addr, "alice-token").await;
    let _ = recv_json(&mut ws).await;

    send_json(&mut ws, json!({"type": "subscribe", "channel": "alerts"})).await;
    assert_eq!(recv_json(&mut ws).await["type"], "subscribed");

    send_json(&mut ws, json!({"type": "unsubscribe", "channel": "alerts"})).await;
    assert_eq!(recv_json(&mut ws).await["type"], "unsubscribed");

    let delivered = hub
        .broadcast(Channel::Alerts, "alert", json!({"alertId": "a2"}))
        .await;
    assert_eq!(delivered, 0);
}

#[tokio::test]
async fn missing_token_closes_with_unauthorized_code() {
    let (addr, hub) = start_hub(HubConfig::default()).await;

    let (mut ws, _) = connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("connect");
    assert_eq!(recv_close_code(&mut ws).await, 4001);
    assert_eq!(hub.session_count().await, 0);
}

#[tokio::test]
async fn invalid_token_closes_with_unauthorized_code() {
    let (addr, hub) = start_hub(HubConfig::default()).await;

    let mut ws = connect(addr, "wrong-token").await;
    assert_eq!(recv_close_code(&mut ws).await, 4001);
    assert_eq!(hub.session_count().await, 0);
    assert_eq!(hub.metrics().rejected_upgrades(), 1);
}

#[tokio::test]
async fn session_cap_closes_with_capacity_code() {
    let config = HubConfig::default().with_max_sessions_per_user(1);
    let (addr, hub) = start_hub(config).await;

    let mut first = connect(addr, "alice-token").await;
    let _ = recv_json(&mut first).await;

    let mut second = connect(addr, "alice-token").await;
    assert_eq!(recv_close_code(&mut second).await, 4002);
    assert_eq!(hub.session_count().await, 1);

    // A different user still connects.
    let mut bob = connect(addr, "bob-token").await;
    assert_eq!(recv_json(&mut bob).await["type"], "connection");
}

#[tokio::test]
async fn bot_command_is_acknowledged() {
    let (addr, hub) = start_hub(HubConfig::default()).await;
    let mut events = hub.events();
    let mut ws = connect(addr, "alice-token").await;
    let _ = recv_json(&mut ws).await;
    let _ = events.recv().await.expect("connect event");

    send_json(
        &mut ws,
        json!({"type": "bot_command", "data": {"action": "pause", "botId": "b1"}}),
    )
    .await;

    assert_eq!(recv_json(&mut ws).await["type"], "bot_command_ack");

    match events.recv().await.expect("event") {
        tradewire_hub::HubEvent::CommandReceived { user_id, data, .. } => {
            assert_eq!(user_id, 1);
            assert_eq!(data["action"], "pause");
        }
        other => panic!("expected command event, got {other:?}"),
    }
}

#[tokio::test]
async fn disconnect_cleans_up_subscriptions() {
    let (addr, hub) = start_hub(HubConfig::default()).await;
    let mut ws = connect(addr, "alice-token").await;
    let _ = recv_json(&mut ws).await;

    send_json(&mut ws, json!({"type": "subscribe", "channel": "alerts"})).await;
    assert_eq!(recv_json(&mut ws).await["type"], "subscribed");
    assert_eq!(hub.subscriber_count(Channel::Alerts).await, 1);

    ws.close(None).await.expect("close");

    // The server runs the disconnect path shortly after the close.
    timeout(Duration::from_secs(5), async {
        while hub.session_count().await != 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("session cleanup");

    assert_eq!(hub.subscriber_count(Channel::Alerts).await, 0);
}
