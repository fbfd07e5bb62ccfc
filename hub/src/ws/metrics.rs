//! Hub metrics.
//!
//! Atomic counters for monitoring the connection hub. Aggregation and
//! persistence of these numbers is an external collaborator's concern.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for the connection hub.
#[derive(Debug, Default)]
pub struct HubMetrics {
    sessions_opened: AtomicU64,
    sessions_closed: AtomicU64,
    sessions_evicted: AtomicU64,
    rejected_upgrades: AtomicU64,
    messages_received: AtomicU64,
    messages_sent: AtomicU64,
    broadcasts: AtomicU64,
    delivery_failures: AtomicU64,
    protocol_errors: AtomicU64,
}

impl HubMetrics {
    /// Creates a new metrics instance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a session opened.
    pub fn record_session_opened(&self) {
        self.sessions_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a session closed.
    pub fn record_session_closed(&self) {
        self.sessions_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a liveness eviction.
    pub fn record_eviction(&self) {
        self.sessions_evicted.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a rejected connection upgrade.
    pub fn record_rejected_upgrade(&self) {
        self.rejected_upgrades.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an inbound message.
    pub fn record_message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an outbound message.
    pub fn record_message_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a broadcast call.
    pub fn record_broadcast(&self) {
        self.broadcasts.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a per-subscriber delivery failure.
    pub fn record_delivery_failure(&self) {
        self.delivery_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a protocol error answered with an error response.
    pub fn record_protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns sessions opened.
    #[must_use]
    pub fn sessions_opened(&self) -> u64 {
        self.sessions_opened.load(Ordering::Relaxed)
    }

    /// Returns sessions closed.
    #[must_use]
    pub fn sessions_closed(&self) -> u64 {
        self.sessions_closed.load(Ordering::Relaxed)
    }

    /// Returns currently open sessions.
    #[must_use]
    pub fn active_sessions(&self) -> u64 {
        self.sessions_opened()
            .saturating_sub(self.sessions_closed())
    }

    /// Returns liveness evictions.
    #[must_use]
    pub fn evictions(&self) -> u64 {
        self.sessions_evicted.load(Ordering::Relaxed)
    }

    /// Returns rejected upgrades.
    #[must_use]
    pub fn rejected_upgrades(&self) -> u64 {
        self.rejected_upgrades.load(Ordering::Relaxed)
    }

    /// Returns inbound messages.
    #[must_use]
    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    /// Returns outbound messages.
    #[must_use]
    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }

    /// Returns broadcast calls.
    #[must_use]
    pub fn broadcasts(&self) -> u64 {
        self.broadcasts.load(Ordering::Relaxed)
    }

    /// Returns per-subscriber delivery failures.
    #[must_use]
    pub fn delivery_failures(&self) -> u64 {
        self.delivery_failures.load(Ordering::Relaxed)
    }

    /// Returns protocol errors.
    #[must_use]
    pub fn protocol_errors(&self) -> u64 {
        self.protocol_errors.load(Ordering::Relaxed)
    }

    /// Returns a point-in-time snapshot.
    #[must_use]
    pub fn snapshot(&self) -> HubMetricsSnapshot {
        HubMetricsSnapshot {
            sessions_opened: self.sessions_opened(),
            sessions_closed: self.sessions_closed(),
            active_sessions: self.active_sessions(),
            evictions: self.evictions(),
            rejected_upgrades: self.rejected_upgrades(),
            messages_received: self.messages_received(),
            messages_sent: self.messages_sent(),
            broadcasts: self.broadcasts(),
            delivery_failures: self.delivery_failures(),
            protocol_errors: self.protocol_errors(),
        }
    }
}

/// A point-in-time snapshot of hub metrics.
#[derive(Debug, Clone)]
pub struct HubMetricsSnapshot {
    /// Sessions opened.
    pub sessions_opened: u64,
    /// Sessions closed.
    pub sessions_closed: u64,
    /// Currently open sessions.
    pub active_sessions: u64,
    /// Liveness evictions.
    pub evictions: u64,
    /// Rejected upgrades.
    pub rejected_upgrades: u64,
    /// Inbound messages.
    pub messages_received: u64,
    /// Outbound messages.
    pub messages_sent: u64,
    /// Broadcast calls.
    pub broadcasts: u64,
    /// Per-subscriber delivery failures.
    pub delivery_failures: u64,
    /// Protocol errors.
    pub protocol_errors: u64,
}
