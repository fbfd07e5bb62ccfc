//! Hub configuration.
//!
//! Provides configuration options for the connection hub.

use std::time::Duration;

/// Default maximum concurrent sessions per user.
pub const DEFAULT_MAX_SESSIONS_PER_USER: u32 = 5;

/// Default liveness ping interval in seconds.
pub const DEFAULT_PING_INTERVAL_SECS: u64 = 30;

/// Default liveness timeout in seconds (2x the ping interval).
pub const DEFAULT_LIVENESS_TIMEOUT_SECS: u64 = 60;

/// Default per-session outbox capacity.
pub const DEFAULT_OUTBOX_CAPACITY: usize = 64;

/// Configuration for the connection hub.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Maximum concurrent sessions per user.
    pub max_sessions_per_user: u32,

    /// Interval between liveness ping sweeps.
    pub ping_interval: Duration,

    /// Interval between eviction sweeps.
    pub eviction_interval: Duration,

    /// A session with no liveness signal for longer than this is evicted.
    pub liveness_timeout: Duration,

    /// Capacity of each session's outbound message queue.
    pub outbox_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_sessions_per_user: DEFAULT_MAX_SESSIONS_PER_USER,
            ping_interval: Duration::from_secs(DEFAULT_PING_INTERVAL_SECS),
            eviction_interval: Duration::from_secs(DEFAULT_PING_INTERVAL_SECS),
            liveness_timeout: Duration::from_secs(DEFAULT_LIVENESS_TIMEOUT_SECS),
            outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
        }
    }
}

impl HubConfig {
    /// Sets the per-user session cap.
    #[must_use]
    pub fn with_max_sessions_per_user(mut self, max: u32) -> Self {
        self.max_sessions_per_user = max;
        self
    }

    /// Sets the liveness ping interval.
    #[must_use]
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Sets the eviction sweep interval.
    #[must_use]
    pub fn with_eviction_interval(mut self, interval: Duration) -> Self {
        self.eviction_interval = interval;
        self
    }

    /// Sets the liveness timeout.
    #[must_use]
    pub fn with_liveness_timeout(mut self, timeout: Duration) -> Self {
        self.liveness_timeout = timeout;
        self
    }

    /// Sets the per-session outbox capacity.
    #[must_use]
    pub fn with_outbox_capacity(mut self, capacity: usize) -> Self {
        self.outbox_capacity = capacity;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error message if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_sessions_per_user == 0 {
            return Err(ConfigError::InvalidSessionCap);
        }

        if self.liveness_timeout < self.ping_interval {
            return Err(ConfigError::InvalidLivenessTimeout);
        }

        if self.outbox_capacity == 0 {
            return Err(ConfigError::InvalidOutboxCapacity);
        }

        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Invalid session cap.
    #[error("max_sessions_per_user must be > 0")]
    InvalidSessionCap,

    /// Invalid liveness timeout.
    #[error("liveness_timeout must be >= ping_interval")]
    InvalidLivenessTimeout,

    /// Invalid outbox capacity.
    #[error("outbox_capacity must be > 0")]
    InvalidOutboxCapacity,
}
