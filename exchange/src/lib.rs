//! Tradewire exchange link - resilient market-data client.
//!
//! This crate maintains an outbound WebSocket connection to an exchange
//! market-data endpoint and turns its feed into canonical events for the
//! rest of the platform.
//!
//! # Core Types
//!
//! - [`ExchangeLink`] — connection state machine with heartbeat and
//!   exponential-backoff reconnection
//! - [`SubscriptionLedger`] — the feeds that must stay subscribed; survives
//!   reconnects and is replayed after each successful connect
//! - [`MarketEvent`] — normalized ticker/trade/orderbook/kline events
//! - [`LinkEvent`] — market data plus connection lifecycle notifications
//!
//! # Example
//!
//! ```no_run
//! use tradewire_exchange::{ExchangeLink, LinkConfig, LinkEvent};
//!
//! # async fn run() -> Result<(), tradewire_exchange::LinkError> {
//! let link = ExchangeLink::new(LinkConfig::sandbox())?;
//! let mut events = link.events();
//!
//! link.connect().await?;
//! link.subscribe_ticker("BTCUSDT").await?;
//!
//! while let Ok(event) = events.recv().await {
//!     if let LinkEvent::MarketData(data) = event {
//!         println!("{data:?}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod frames;
pub mod normalizer;
pub mod state;
pub mod subscriptions;

pub use client::ExchangeLink;
pub use config::{Environment, LinkConfig};
pub use error::LinkError;
pub use events::LinkEvent;
pub use frames::{ControlFrame, ControlOp, InboundFrame};
pub use normalizer::{normalize, BookLevel, MarketEvent, TradeSide};
pub use state::{reconnect_delay, LinkState, LinkStatus};
pub use subscriptions::{SubscriptionLedger, SubscriptionRequest, Topic};
