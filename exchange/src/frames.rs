//! Wire frames for the exchange protocol.
//!
//! Defines the outbound control frame and the inbound frame shapes. Inbound
//! decoding is the one place a dynamic payload (`serde_json::Value`) is
//! allowed; everything past this boundary is typed.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outbound control operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlOp {
    /// Subscribe to feeds.
    Subscribe,
    /// Unsubscribe from feeds.
    Unsubscribe,
    /// Liveness probe.
    Ping,
}

/// Outbound control frame (`{ op, args }`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlFrame {
    /// Operation.
    pub op: ControlOp,
    /// Feed arguments (`topic` or `topic.symbol`), absent for pings.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

impl ControlFrame {
    /// Creates a subscribe frame.
    #[must_use]
    pub fn subscribe(args: Vec<String>) -> Self {
        Self {
            op: ControlOp::Subscribe,
            args,
        }
    }

    /// Creates an unsubscribe frame.
    #[must_use]
    pub fn unsubscribe(args: Vec<String>) -> Self {
        Self {
            op: ControlOp::Unsubscribe,
            args,
        }
    }

    /// Creates a ping frame.
    #[must_use]
    pub fn ping() -> Self {
        Self {
            op: ControlOp::Ping,
            args: Vec::new(),
        }
    }
}

/// Inbound frame from the exchange.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum InboundFrame {
    /// Subscription acknowledgement.
    Ack {
        /// Whether the request succeeded.
        success: bool,
        /// Optional response message.
        #[serde(default)]
        ret_msg: Option<String>,
        /// Optional request identifier.
        #[serde(default)]
        req_id: Option<String>,
    },

    /// Market data payload for a topic.
    Data {
        /// Full topic string (e.g. `tickers.BTCUSDT`).
        topic: String,
        /// Raw payload; decoded further by the normalizer.
        data: Value,
        /// Exchange timestamp in milliseconds.
        #[serde(default)]
        ts: Option<i64>,
    },

    /// Anything else, including liveness replies.
    Other(Value),
}

impl InboundFrame {
    /// Parses an inbound text frame.
    ///
    /// # Errors
    ///
    /// Returns the underlying serde error when the text is not valid JSON.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Returns true if this frame is a liveness reply.
    #[must_use]
    pub fn is_pong(&self) -> bool {
        match self {
            Self::Other(value) => {
                value.get("type").and_then(Value::as_str) == Some("pong")
                    || value.get("op").and_then(Value::as_str) == Some("pong")
            }
            _ => false,
        }
    }
}
