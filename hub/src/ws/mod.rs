//! WebSocket hub module.
//!
//! Provides the connection hub: authenticated sessions, channel
//! subscriptions, broadcast fan-out, and liveness supervision.
//!
//! # Channels
//!
//! Channels are a fixed enumerated set (`system-health`, `bot-status`,
//! `alerts`, `signals`, `time-sync`) shared between client and server.
//!
//! # Message Types
//!
//! - `subscribe` / `unsubscribe` — channel subscription requests
//! - `ping` — application-level heartbeat
//! - `bot_command` — opaque command, acknowledged and forwarded
//! - broadcast payloads carry a caller-chosen `type` tag

pub mod channels;
pub mod handler;
pub mod hub;
pub mod liveness;
pub mod messages;
pub mod metrics;
pub mod session;

pub use channels::{Channel, ChannelDirectory};
pub use handler::{ws_handler, WsState, CLOSE_SESSION_LIMIT, CLOSE_UNAUTHORIZED};
pub use hub::ConnectionHub;
pub use liveness::LivenessHandle;
pub use messages::{ClientMessage, Response, ServerMessage};
pub use metrics::HubMetrics;
pub use session::{Outbound, Session, SessionId, SessionRegistry};
