//! Market data normalizer.
//!
//! Turns raw exchange payloads into canonical [`MarketEvent`]s. Payload kind
//! is determined by the topic prefix; numeric fields that fail to parse
//! coerce to zero, and payloads that cannot be interpreted at all are logged
//! and dropped rather than surfaced as link errors.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Taker side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    /// Buyer was the taker.
    Buy,
    /// Seller was the taker.
    Sell,
}

impl TradeSide {
    fn parse(value: &Value) -> Self {
        match value.as_str() {
            Some(side) if side.eq_ignore_ascii_case("sell") => Self::Sell,
            _ => Self::Buy,
        }
    }
}

/// One aggregated order book level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookLevel {
    /// Price.
    pub price: Decimal,
    /// Quantity at the price.
    pub quantity: Decimal,
}

/// Canonical, exchange-agnostic market data event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MarketEvent {
    /// Ticker update.
    Ticker {
        /// Symbol.
        symbol: String,
        /// Last price.
        price: Decimal,
        /// 24h volume.
        volume: Decimal,
        /// Timestamp in milliseconds.
        timestamp: i64,
        /// Source exchange identifier.
        exchange: String,
    },

    /// Executed trade.
    Trade {
        /// Symbol.
        symbol: String,
        /// Trade price.
        price: Decimal,
        /// Trade quantity.
        quantity: Decimal,
        /// Taker side.
        side: TradeSide,
        /// Timestamp in milliseconds.
        timestamp: i64,
        /// Exchange trade identifier.
        trade_id: String,
    },

    /// Order book snapshot or delta.
    Orderbook {
        /// Symbol.
        symbol: String,
        /// Bid levels.
        bids: Vec<BookLevel>,
        /// Ask levels.
        asks: Vec<BookLevel>,
        /// Timestamp in milliseconds.
        timestamp: i64,
    },

    /// Candlestick update.
    Kline {
        /// Symbol.
        symbol: String,
        /// Interval code.
        interval: String,
        /// Open price.
        open: Decimal,
        /// High price.
        high: Decimal,
        /// Low price.
        low: Decimal,
        /// Close price.
        close: Decimal,
        /// Volume.
        volume: Decimal,
        /// Timestamp in milliseconds.
        timestamp: i64,
    },
}

impl MarketEvent {
    /// Returns the symbol the event refers to.
    #[must_use]
    pub fn symbol(&self) -> &str {
        match self {
            Self::Ticker { symbol, .. }
            | Self::Trade { symbol, .. }
            | Self::Orderbook { symbol, .. }
            | Self::Kline { symbol, .. } => symbol,
        }
    }
}

/// Normalizes one raw data frame into zero or more market events.
///
/// A single payload may contain a batch (e.g. several trades); each logical
/// record becomes its own event. Returns an empty vector for payloads that
/// cannot be interpreted.
#[must_use]
pub fn normalize(exchange: &str, topic: &str, data: &Value, ts: Option<i64>) -> Vec<MarketEvent> {
    let timestamp = ts.unwrap_or_else(|| chrono::Utc::now().timestamp_millis());

    if topic.starts_with("tickers") {
        normalize_ticker(exchange, topic, data, timestamp)
            .map(|event| vec![event])
            .unwrap_or_default()
    } else if topic.starts_with("publicTrade") {
        normalize_trades(topic, data, timestamp)
    } else if topic.starts_with("orderbook") {
        normalize_orderbook(topic, data, timestamp)
            .map(|event| vec![event])
            .unwrap_or_default()
    } else if topic.starts_with("kline") {
        normalize_klines(topic, data, timestamp)
    } else {
        warn!(topic, "unrecognized topic, dropping payload");
        Vec::new()
    }
}

fn normalize_ticker(
    exchange: &str,
    topic: &str,
    data: &Value,
    timestamp: i64,
) -> Option<MarketEvent> {
    let object = data.as_object().or_else(|| {
        warn!(topic, "ticker payload is not an object, dropping");
        None
    })?;

    let symbol = object
        .get("symbol")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| symbol_from_topic(topic))?;

    Some(MarketEvent::Ticker {
        symbol,
        price: decimal_or_zero(object.get("lastPrice")),
        volume: decimal_or_zero(object.get("volume24h")),
        timestamp,
        exchange: exchange.to_string(),
    })
}

fn normalize_trades(topic: &str, data: &Value, timestamp: i64) -> Vec<MarketEvent> {
    let Some(records) = data.as_array() else {
        warn!(topic, "trade payload is not an array, dropping");
        return Vec::new();
    };

    records
        .iter()
        .filter_map(|record| {
            let symbol = record
                .get("s")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| symbol_from_topic(topic))?;

            Some(MarketEvent::Trade {
                symbol,
                price: decimal_or_zero(record.get("p")),
                quantity: decimal_or_zero(record.get("v")),
                side: TradeSide::parse(record.get("S").unwrap_or(&Value::Null)),
                timestamp: record.get("T").and_then(Value::as_i64).unwrap_or(timestamp),
                trade_id: record
                    .get("i")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            })
        })
        .collect()
}

fn normalize_orderbook(topic: &str, data: &Value, timestamp: i64) -> Option<MarketEvent> {
    let object = data.as_object().or_else(|| {
        warn!(topic, "orderbook payload is not an object, dropping");
        None
    })?;

    let symbol = object
        .get("s")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| symbol_from_topic(topic))?;

    Some(MarketEvent::Orderbook {
        symbol,
        bids: book_levels(object.get("b")),
        asks: book_levels(object.get("a")),
        timestamp,
    })
}

fn normalize_klines(topic: &str, data: &Value, timestamp: i64) -> Vec<MarketEvent> {
    let Some(records) = data.as_array() else {
        warn!(topic, "kline payload is not an array, dropping");
        return Vec::new();
    };

    let Some(symbol) = symbol_from_topic(topic) else {
        warn!(topic, "kline topic carries no symbol, dropping");
        return Vec::new();
    };

    records
        .iter()
        .map(|record| MarketEvent::Kline {
            symbol: symbol.clone(),
            interval: record
                .get("interval")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| interval_from_topic(topic))
                .unwrap_or_default(),
            open: decimal_or_zero(record.get("open")),
            high: decimal_or_zero(record.get("high")),
            low: decimal_or_zero(record.get("low")),
            close: decimal_or_zero(record.get("close")),
            volume: decimal_or_zero(record.get("volume")),
            timestamp: record
                .get("start")
                .and_then(Value::as_i64)
                .unwrap_or(timestamp),
        })
        .collect()
}

/// Extracts the symbol from a topic's trailing segment.
fn symbol_from_topic(topic: &str) -> Option<String> {
    let tail = topic.rsplit('.').next()?;
    // A trailing numeric segment is a depth/interval parameter, not a symbol.
    if tail.is_empty() || tail == topic || tail.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(tail.to_string())
}

/// Extracts the interval from a `kline.{interval}.{symbol}` topic.
fn interval_from_topic(topic: &str) -> Option<String> {
    let mut parts = topic.split('.');
    match (parts.next(), parts.next()) {
        (Some("kline"), Some(interval)) => Some(interval.to_string()),
        _ => None,
    }
}

/// Coerces a JSON value to a decimal, defaulting to zero.
fn decimal_or_zero(value: Option<&Value>) -> Decimal {
    let Some(value) = value else {
        return Decimal::ZERO;
    };
    match value {
        Value::String(text) => text.parse().unwrap_or(Decimal::ZERO),
        Value::Number(number) => number.to_string().parse().unwrap_or(Decimal::ZERO),
        _ => Decimal::ZERO,
    }
}

fn book_levels(value: Option<&Value>) -> Vec<BookLevel> {
    value
        .and_then(Value::as_array)
        .map(|levels| {
            levels
                .iter()
                .filter_map(|level| {
                    let pair = level.as_array()?;
                    Some(BookLevel {
                        price: decimal_or_zero(pair.first()),
                        quantity: decimal_or_zero(pair.get(1)),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}
