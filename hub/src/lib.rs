//! Tradewire hub - realtime WebSocket backbone for the trading platform.
//!
//! The hub authenticates client sessions, tracks per-session channel
//! subscriptions, fans broadcasts out to subscribers, and evicts sessions
//! that stop signaling liveness.
//!
//! # Core Types
//!
//! - [`ConnectionHub`] — session registry, channel directory, and the
//!   `broadcast`/`send_to_user` surface used by the rest of the platform
//! - [`Channel`] — the fixed set of broadcast topics
//! - [`CredentialVerifier`] — injected bearer-token verification
//! - [`Server`] — axum server exposing the `/ws` upgrade route
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tradewire_hub::{
//!     Channel, ConnectionHub, HubConfig, Server, ServerConfig, StaticTokenVerifier, WsState,
//! };
//!
//! # async fn run() -> Result<(), tradewire_hub::HubError> {
//! let hub = ConnectionHub::new(HubConfig::default());
//! let verifier = Arc::new(StaticTokenVerifier::new());
//!
//! // External collaborators broadcast through the hub handle.
//! hub.broadcast(Channel::BotStatus, "data", serde_json::json!({"botId": "b1"}))
//!     .await;
//!
//! let server = Server::new(ServerConfig::default(), WsState::new(hub, verifier));
//! server.run().await
//! # }
//! ```

pub mod audit;
pub mod auth;
pub mod config;
pub mod error;
pub mod events;
pub mod server;
pub mod ws;

pub use audit::{AuditEntry, AuditKind, AuditSink, TracingAuditSink};
pub use auth::{AuthError, CredentialVerifier, Identity, StaticTokenVerifier};
pub use config::HubConfig;
pub use error::HubError;
pub use events::HubEvent;
pub use server::{router, Server, ServerConfig};
pub use ws::{
    Channel, ClientMessage, ConnectionHub, HubMetrics, Response, ServerMessage, SessionId, WsState,
    CLOSE_SESSION_LIMIT, CLOSE_UNAUTHORIZED,
};
