//! Exchange link configuration.
//!
//! Provides configuration options for the exchange link.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LinkError;

/// Default production stream URL.
pub const PRODUCTION_WS_URL: &str = "wss://stream.marketdata.example/v5/public";

/// Default sandbox stream URL.
pub const SANDBOX_WS_URL: &str = "wss://stream-sandbox.marketdata.example/v5/public";

/// Default connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default heartbeat interval in seconds.
pub const DEFAULT_HEARTBEAT_SECS: u64 = 20;

/// Default base reconnect delay in seconds.
pub const DEFAULT_RECONNECT_DELAY_SECS: u64 = 5;

/// Default maximum reconnection attempts.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 10;

/// Default delay between subscription replays in milliseconds.
pub const DEFAULT_REPLAY_DELAY_MS: u64 = 100;

/// Exchange environment selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Live production feed.
    Production,
    /// Sandbox feed for testing.
    Sandbox,
}

impl Environment {
    /// Returns the default stream URL for this environment.
    #[must_use]
    pub const fn default_url(&self) -> &'static str {
        match self {
            Self::Production => PRODUCTION_WS_URL,
            Self::Sandbox => SANDBOX_WS_URL,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Production => write!(f, "production"),
            Self::Sandbox => write!(f, "sandbox"),
        }
    }
}

/// Configuration for the exchange link.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Exchange environment.
    pub environment: Environment,

    /// Stream URL (derived from the environment unless overridden).
    pub url: String,

    /// Identifier stamped on normalized events.
    pub exchange_id: String,

    /// Connect timeout.
    pub connect_timeout: Duration,

    /// Heartbeat interval while connected.
    pub heartbeat_interval: Duration,

    /// Base delay for exponential reconnect backoff.
    pub base_reconnect_delay: Duration,

    /// Maximum consecutive reconnection attempts.
    pub max_reconnect_attempts: u32,

    /// Delay between replayed subscriptions after a reconnect.
    pub replay_delay: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self::new(Environment::Production)
    }
}

impl LinkConfig {
    /// Creates a configuration for the given environment.
    #[must_use]
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            url: environment.default_url().to_string(),
            exchange_id: "primary".to_string(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_SECS),
            base_reconnect_delay: Duration::from_secs(DEFAULT_RECONNECT_DELAY_SECS),
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            replay_delay: Duration::from_millis(DEFAULT_REPLAY_DELAY_MS),
        }
    }

    /// Creates a sandbox configuration.
    #[must_use]
    pub fn sandbox() -> Self {
        Self::new(Environment::Sandbox)
    }

    /// Overrides the stream URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Sets the identifier stamped on normalized events.
    #[must_use]
    pub fn with_exchange_id(mut self, id: impl Into<String>) -> Self {
        self.exchange_id = id.into();
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the heartbeat interval.
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Sets the base reconnect delay.
    #[must_use]
    pub fn with_base_reconnect_delay(mut self, delay: Duration) -> Self {
        self.base_reconnect_delay = delay;
        self
    }

    /// Sets the maximum reconnection attempts.
    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Sets the delay between replayed subscriptions.
    #[must_use]
    pub fn with_replay_delay(mut self, delay: Duration) -> Self {
        self.replay_delay = delay;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), LinkError> {
        if self.url.is_empty() {
            return Err(LinkError::InvalidConfig("url cannot be empty".to_string()));
        }

        if !self.url.starts_with("ws://") && !self.url.starts_with("wss://") {
            return Err(LinkError::InvalidConfig(
                "url must start with ws:// or wss://".to_string(),
            ));
        }

        if self.max_reconnect_attempts == 0 {
            return Err(LinkError::InvalidConfig(
                "max_reconnect_attempts must be > 0".to_string(),
            ));
        }

        if self.exchange_id.is_empty() {
            return Err(LinkError::InvalidConfig(
                "exchange_id cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}
