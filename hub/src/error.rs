//! Hub error types.
//!
//! Provides error types for hub operations.

/// Hub errors.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// The user already has the maximum number of concurrent sessions.
    #[error("session limit reached for user {user_id}")]
    SessionLimit {
        /// Owning user.
        user_id: u64,
    },

    /// The hub is shutting down and not accepting sessions.
    #[error("hub is shutting down")]
    ShuttingDown,

    /// Transport-level failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
