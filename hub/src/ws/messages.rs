//! Hub wire protocol messages.
//!
//! Defines the message format for client-server communication. Fixed
//! response kinds are typed variants; broadcast payloads carry a
//! caller-chosen type tag and are the one dynamic boundary.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::channels::Channel;

/// Message sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Subscribe to a channel.
    Subscribe {
        /// Wire channel name.
        channel: String,
    },

    /// Unsubscribe from a channel.
    Unsubscribe {
        /// Wire channel name.
        channel: String,
    },

    /// Application-level heartbeat request.
    Ping,

    /// Opaque bot command, acknowledged and forwarded to listeners.
    BotCommand {
        /// Command payload.
        #[serde(default)]
        data: Value,
    },

    /// Any message kind this protocol version does not know.
    #[serde(other)]
    Unknown,
}

/// Fixed-kind response sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Welcome message sent once after a successful upgrade.
    Connection {
        /// Always `system`.
        channel: String,
        /// Welcome payload.
        data: ConnectionData,
    },

    /// Subscription confirmed.
    Subscribed {
        /// Confirmed channel.
        channel: Channel,
    },

    /// Unsubscription confirmed.
    Unsubscribed {
        /// Confirmed channel.
        channel: Channel,
    },

    /// Heartbeat acknowledgement.
    Pong,

    /// Bot command acknowledgement.
    BotCommandAck,

    /// Error response; the session stays connected.
    Error {
        /// Error payload.
        data: ErrorData,
    },
}

/// Welcome payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionData {
    /// Greeting text.
    pub message: String,
    /// Valid channel names.
    pub channels: Vec<Channel>,
}

/// Error payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorData {
    /// Stable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

/// Broadcast envelope with a caller-chosen type tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Broadcast {
    /// Caller-chosen message type.
    #[serde(rename = "type")]
    pub kind: String,
    /// Source channel.
    pub channel: Channel,
    /// Payload.
    pub data: Value,
}

/// Message sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
    /// A fixed-kind protocol response.
    Response(Response),
    /// A broadcast fan-out payload.
    Broadcast(Broadcast),
}

impl ServerMessage {
    /// Creates the welcome message.
    #[must_use]
    pub fn connection() -> Self {
        Self::Response(Response::Connection {
            channel: "system".to_string(),
            data: ConnectionData {
                message: "connected".to_string(),
                channels: Channel::ALL.to_vec(),
            },
        })
    }

    /// Creates a subscribed confirmation.
    #[must_use]
    pub fn subscribed(channel: Channel) -> Self {
        Self::Response(Response::Subscribed { channel })
    }

    /// Creates an unsubscribed confirmation.
    #[must_use]
    pub fn unsubscribed(channel: Channel) -> Self {
        Self::Response(Response::Unsubscribed { channel })
    }

    /// Creates a pong response.
    #[must_use]
    pub fn pong() -> Self {
        Self::Response(Response::Pong)
    }

    /// Creates a bot command acknowledgement.
    #[must_use]
    pub fn bot_command_ack() -> Self {
        Self::Response(Response::BotCommandAck)
    }

    /// Creates an error response.
    #[must_use]
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Response(Response::Error {
            data: ErrorData {
                code: code.into(),
                message: message.into(),
            },
        })
    }

    /// Creates a broadcast message.
    #[must_use]
    pub fn broadcast(kind: impl Into<String>, channel: Channel, data: Value) -> Self {
        Self::Broadcast(Broadcast {
            kind: kind.into(),
            channel,
            data,
        })
    }
}
