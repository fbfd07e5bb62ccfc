//! Exchange link error types.
//!
//! Provides error types for exchange link operations.

/// Exchange link errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Connection attempt timed out.
    #[error("connection timed out after {0}ms")]
    ConnectTimeout(u64),

    /// Not connected.
    #[error("not connected")]
    NotConnected,

    /// Connection closed.
    #[error("connection closed")]
    Closed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Failed to serialize an outbound frame.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
