//! End-to-end exchange link tests against an in-process WebSocket server.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use tradewire_exchange::{ExchangeLink, LinkConfig, LinkEvent, LinkState, MarketEvent};

fn fast_config(url: String) -> LinkConfig {
    LinkConfig::sandbox()
        .with_url(url)
        .with_connect_timeout(Duration::from_secs(5))
        .with_heartbeat_interval(Duration::from_secs(60))
        .with_base_reconnect_delay(Duration::from_millis(50))
        .with_replay_delay(Duration::from_millis(1))
        .with_max_reconnect_attempts(5)
}

/// Waits for the next event matching the predicate, skipping others.
async fn expect_event<F>(events: &mut broadcast::Receiver<LinkEvent>, predicate: F) -> LinkEvent
where
    F: Fn(&LinkEvent) -> bool,
{
    loop {
        let event = timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed");
        if predicate(&event) {
            return event;
        }
    }
}

#[tokio::test]
async fn reconnects_and_replays_subscriptions_after_abnormal_close() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (frames_tx, mut frames_rx) = mpsc::unbounded_channel::<(u32, String)>();

    tokio::spawn(async move {
        // First connection: read the subscribe frame, then drop abruptly.
        let (socket, _) = listener.accept().await.expect("accept");
        let mut ws = accept_async(socket).await.expect("handshake");
        if let Some(Ok(Message::Text(text))) = ws.next().await {
            let _ = frames_tx.send((1, text.to_string()));
        }
        drop(ws);

        // Second connection: record frames and stay open.
        let (socket, _) = listener.accept().await.expect("accept");
        let mut ws = accept_async(socket).await.expect("handshake");
        while let Some(Ok(message)) = ws.next().await {
            if let Message::Text(text) = message {
                let _ = frames_tx.send((2, text.to_string()));
            }
        }
    });

    let link = ExchangeLink::new(fast_config(format!("ws://{addr}/stream"))).expect("link");
    let mut events = link.events();

    link.connect().await.expect("connect");
    link.subscribe_ticker("BTCUSDT").await.expect("subscribe");

    // The live subscribe reaches the first connection.
    let (conn, frame) = timeout(Duration::from_secs(5), frames_rx.recv())
        .await
        .expect("frame")
        .expect("channel open");
    assert_eq!(conn, 1);
    assert!(frame.contains("tickers.BTCUSDT"));

    // Lifecycle: connected, lost, reconnected without caller intervention.
    expect_event(&mut events, |e| matches!(e, LinkEvent::Connected)).await;
    expect_event(&mut events, |e| matches!(e, LinkEvent::Disconnected { .. })).await;
    expect_event(&mut events, |e| matches!(e, LinkEvent::Connected)).await;

    // The ledger entry is replayed on the second connection.
    let (conn, frame) = timeout(Duration::from_secs(5), frames_rx.recv())
        .await
        .expect("frame")
        .expect("channel open");
    assert_eq!(conn, 2);
    assert!(frame.contains("tickers.BTCUSDT"));

    assert!(link.is_connected().await);
    assert_eq!(link.reconnect_attempts().await, 0);
}

#[tokio::test]
async fn stops_after_max_reconnect_attempts() {
    // Bind then drop so the port has no listener.
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let config = fast_config(format!("ws://{addr}/stream"))
        .with_base_reconnect_delay(Duration::from_millis(10))
        .with_max_reconnect_attempts(3);
    let link = ExchangeLink::new(config).expect("link");
    let mut events = link.events();

    assert!(link.connect().await.is_err());

    let event = expect_event(&mut events, |e| {
        matches!(e, LinkEvent::MaxReconnectAttemptsReached { .. })
    })
    .await;
    assert_eq!(event, LinkEvent::MaxReconnectAttemptsReached { attempts: 3 });
    assert_eq!(link.state().await, LinkState::Disconnected);

    // The signal fires exactly once and no further attempts are scheduled.
    sleep(Duration::from_millis(200)).await;
    assert!(matches!(
        events.try_recv(),
        Err(broadcast::error::TryRecvError::Empty)
    ));
    assert_eq!(link.state().await, LinkState::Disconnected);
}

#[tokio::test]
async fn coerces_bad_numeric_fields_and_survives_garbage() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");

    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.expect("accept");
        let mut ws = accept_async(socket).await.expect("handshake");

        // Garbage, then a ticker with a non-numeric price, then a clean one.
        ws.send(Message::Text("definitely not json".into()))
            .await
            .expect("send");
        ws.send(Message::Text(
            r#"{"topic":"tickers.BTCUSDT","data":{"symbol":"BTCUSDT","lastPrice":"oops","volume24h":"10"},"ts":1}"#.into(),
        ))
        .await
        .expect("send");
        ws.send(Message::Text(
            r#"{"topic":"tickers.BTCUSDT","data":{"symbol":"BTCUSDT","lastPrice":"42000.5","volume24h":"10"},"ts":2}"#.into(),
        ))
        .await
        .expect("send");

        // Keep the connection open.
        while ws.next().await.is_some() {}
    });

    let link = ExchangeLink::new(fast_config(format!("ws://{addr}/stream"))).expect("link");
    let mut events = link.events();

    link.connect().await.expect("connect");

    let first = expect_event(&mut events, |e| matches!(e, LinkEvent::MarketData(_))).await;
    match first {
        LinkEvent::MarketData(MarketEvent::Ticker { price, .. }) => {
            assert_eq!(price, Decimal::ZERO);
        }
        other => panic!("expected ticker, got {other:?}"),
    }

    let second = expect_event(&mut events, |e| matches!(e, LinkEvent::MarketData(_))).await;
    match second {
        LinkEvent::MarketData(MarketEvent::Ticker { price, .. }) => {
            assert_eq!(price, "42000.5".parse::<Decimal>().expect("decimal"));
        }
        other => panic!("expected ticker, got {other:?}"),
    }

    // The unparsable frames did not tear down the link.
    assert!(link.is_connected().await);
}

#[tokio::test]
async fn intentional_disconnect_does_not_reconnect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");

    tokio::spawn(async move {
        loop {
            let (socket, _) = listener.accept().await.expect("accept");
            let mut ws = accept_async(socket).await.expect("handshake");
            tokio::spawn(async move { while ws.next().await.is_some() {} });
        }
    });

    let link = ExchangeLink::new(fast_config(format!("ws://{addr}/stream"))).expect("link");
    let mut events = link.events();

    link.connect().await.expect("connect");
    link.subscribe_trades("BTCUSDT").await.expect("subscribe");
    expect_event(&mut events, |e| matches!(e, LinkEvent::Connected)).await;

    link.disconnect().await;
    expect_event(&mut events, |e| matches!(e, LinkEvent::Disconnected { .. })).await;

    sleep(Duration::from_millis(200)).await;
    assert_eq!(link.state().await, LinkState::Disconnected);
    assert!(matches!(
        events.try_recv(),
        Err(broadcast::error::TryRecvError::Empty)
    ));

    // The ledger still holds the intent for a later connect.
    assert_eq!(link.subscriptions().await.len(), 1);
}
