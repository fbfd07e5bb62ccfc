//! WebSocket upgrade handler and connection loop.
//!
//! The bearer credential travels as the `token` query parameter and is
//! verified before the session exists; failures close the transport with a
//! distinguishing code instead of creating a session.

use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::auth::{CredentialVerifier, Identity};
use crate::ws::hub::ConnectionHub;
use crate::ws::session::Outbound;

/// Close code for a missing or invalid credential.
pub const CLOSE_UNAUTHORIZED: u16 = 4001;

/// Close code for exceeding the per-user session cap.
pub const CLOSE_SESSION_LIMIT: u16 = 4002;

/// Shared state for the WebSocket route.
#[derive(Clone)]
pub struct WsState {
    /// The connection hub.
    pub hub: Arc<ConnectionHub>,
    /// Credential verifier (injected; the real one is an external service).
    pub verifier: Arc<dyn CredentialVerifier>,
}

impl WsState {
    /// Creates the route state.
    #[must_use]
    pub fn new(hub: Arc<ConnectionHub>, verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self { hub, verifier }
    }
}

/// Upgrade query parameters.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Bearer credential.
    pub token: Option<String>,
}

/// WebSocket upgrade handler.
///
/// The credential is verified before the upgrade callback runs; an absent or
/// invalid token still completes the upgrade only to close immediately with
/// [`CLOSE_UNAUTHORIZED`].
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<WsState>,
) -> impl IntoResponse {
    let identity = match query.token {
        Some(token) => state.verifier.verify(&token).await.ok(),
        None => None,
    };

    ws.on_upgrade(move |socket| handle_connection(socket, state, identity))
}

/// Runs one connection from upgrade to close.
async fn handle_connection(socket: WebSocket, state: WsState, identity: Option<Identity>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let Some(identity) = identity else {
        state.hub.record_auth_rejected("missing or invalid token").await;
        close_with(&mut ws_sender, CLOSE_UNAUTHORIZED, "invalid or missing token").await;
        return;
    };

    let (session_id, outbox) = match state.hub.register_session(identity).await {
        Ok(pair) => pair,
        Err(error) => {
            debug!(%error, "rejecting connection");
            close_with(&mut ws_sender, CLOSE_SESSION_LIMIT, "session limit reached").await;
            return;
        }
    };

    // Outbound messages ride a per-session queue so one slow peer cannot
    // stall the hub's broadcast sweep.
    let forward = tokio::spawn(forward_outbound(outbox, ws_sender));

    while let Some(result) = ws_receiver.next().await {
        let message = match result {
            Ok(message) => message,
            Err(error) => {
                warn!(session = %session_id, %error, "websocket error");
                break;
            }
        };

        match message {
            Message::Text(text) => {
                state.hub.handle_text(session_id, text.as_str()).await;
            }
            Message::Pong(_) => {
                state.hub.touch(session_id).await;
            }
            Message::Close(_) => {
                info!(session = %session_id, "close requested");
                break;
            }
            // Pings are answered by the protocol layer; binary frames are
            // not part of this protocol.
            _ => {}
        }
    }

    state.hub.disconnect(session_id, "connection closed").await;
    forward.abort();
}

/// Forwards queued outbound items to the socket until the queue closes.
async fn forward_outbound(
    mut outbox: mpsc::Receiver<Outbound>,
    mut ws_sender: SplitSink<WebSocket, Message>,
) {
    while let Some(outbound) = outbox.recv().await {
        let message = match outbound {
            Outbound::Message(message) => match serde_json::to_string(&message) {
                Ok(json) => Message::Text(json.into()),
                Err(error) => {
                    warn!(%error, "failed to serialize outbound message");
                    continue;
                }
            },
            Outbound::Probe => Message::Ping(Vec::new().into()),
        };

        if ws_sender.send(message).await.is_err() {
            break;
        }
    }

    // Queue closed: the session was removed, tell the peer we are done.
    let _ = ws_sender
        .send(Message::Close(Some(CloseFrame {
            code: 1000,
            reason: Utf8Bytes::from_static("closing"),
        })))
        .await;
}

/// Closes the socket with a distinguishing code before any session exists.
async fn close_with(
    ws_sender: &mut SplitSink<WebSocket, Message>,
    code: u16,
    reason: &'static str,
) {
    let _ = ws_sender
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: Utf8Bytes::from_static(reason),
        })))
        .await;
}
