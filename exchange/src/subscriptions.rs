//! Subscription ledger for the exchange link.
//!
//! The ledger is the single source of truth for which feeds must stay
//! subscribed; it survives connection loss and is replayed after each
//! successful reconnect.

use serde::{Deserialize, Serialize};

/// An exchange feed topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    /// Ticker updates.
    Tickers,
    /// Public trade stream.
    PublicTrade,
    /// Order book updates at a given depth.
    Orderbook {
        /// Number of levels per side.
        depth: u32,
    },
    /// Candlestick updates at a given interval.
    Kline {
        /// Interval code (e.g. `1`, `5`, `60`, `D`).
        interval: String,
    },
}

impl Topic {
    /// Returns the wire prefix for this topic.
    #[must_use]
    pub fn wire_prefix(&self) -> String {
        match self {
            Self::Tickers => "tickers".to_string(),
            Self::PublicTrade => "publicTrade".to_string(),
            Self::Orderbook { depth } => format!("orderbook.{depth}"),
            Self::Kline { interval } => format!("kline.{interval}"),
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.wire_prefix())
    }
}

/// One feed the exchange link must keep subscribed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionRequest {
    /// Feed topic.
    pub topic: Topic,
    /// Symbol, when the topic is per-symbol.
    pub symbol: Option<String>,
}

impl SubscriptionRequest {
    /// Creates a new subscription request.
    #[must_use]
    pub fn new(topic: Topic, symbol: Option<String>) -> Self {
        Self { topic, symbol }
    }

    /// Creates a ticker subscription.
    #[must_use]
    pub fn ticker(symbol: impl Into<String>) -> Self {
        Self::new(Topic::Tickers, Some(symbol.into()))
    }

    /// Creates a public-trade subscription.
    #[must_use]
    pub fn trades(symbol: impl Into<String>) -> Self {
        Self::new(Topic::PublicTrade, Some(symbol.into()))
    }

    /// Creates an order book subscription.
    #[must_use]
    pub fn orderbook(symbol: impl Into<String>, depth: u32) -> Self {
        Self::new(Topic::Orderbook { depth }, Some(symbol.into()))
    }

    /// Creates a kline subscription.
    #[must_use]
    pub fn kline(symbol: impl Into<String>, interval: impl Into<String>) -> Self {
        Self::new(
            Topic::Kline {
                interval: interval.into(),
            },
            Some(symbol.into()),
        )
    }

    /// Renders the wire argument (`topic` or `topic.symbol`).
    #[must_use]
    pub fn wire_arg(&self) -> String {
        match &self.symbol {
            Some(symbol) => format!("{}.{}", self.topic.wire_prefix(), symbol),
            None => self.topic.wire_prefix(),
        }
    }
}

/// Insertion-ordered set of subscriptions to maintain across reconnects.
#[derive(Debug, Default, Clone)]
pub struct SubscriptionLedger {
    entries: Vec<SubscriptionRequest>,
}

impl SubscriptionLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a subscription.
    ///
    /// Returns false if the subscription was already present.
    pub fn add(&mut self, request: SubscriptionRequest) -> bool {
        if self.entries.contains(&request) {
            return false;
        }
        self.entries.push(request);
        true
    }

    /// Removes a subscription.
    ///
    /// Returns false if the subscription was not present.
    pub fn remove(&mut self, request: &SubscriptionRequest) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry != request);
        self.entries.len() != before
    }

    /// Returns true if the subscription is present.
    #[must_use]
    pub fn contains(&self, request: &SubscriptionRequest) -> bool {
        self.entries.contains(request)
    }

    /// Returns the entries in insertion order.
    #[must_use]
    pub fn entries(&self) -> Vec<SubscriptionRequest> {
        self.entries.clone()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the ledger is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
