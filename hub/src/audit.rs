//! Connection audit log.
//!
//! Every connect, disconnect, and error event is recorded through an
//! [`AuditSink`]. Writes are best-effort: a sink failure is logged and never
//! affects hub behavior. Persistent storage is an external collaborator; the
//! default sink emits structured tracing events.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::ws::session::SessionId;

/// Kind of audited connection event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditKind {
    /// A session was established.
    Connected,
    /// A session ended (close, eviction, or shutdown).
    Disconnected,
    /// A connection-level error (including rejected upgrades).
    Error,
}

impl std::fmt::Display for AuditKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// One audit record.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    /// Owning user, when known.
    pub user_id: Option<u64>,
    /// Event kind.
    pub kind: AuditKind,
    /// Session, when one was created.
    pub session_id: Option<SessionId>,
    /// Optional detail (close reason, error text).
    pub detail: Option<String>,
    /// Event time.
    pub at: DateTime<Utc>,
}

impl AuditEntry {
    /// Creates a connect entry.
    #[must_use]
    pub fn connected(user_id: u64, session_id: SessionId) -> Self {
        Self {
            user_id: Some(user_id),
            kind: AuditKind::Connected,
            session_id: Some(session_id),
            detail: None,
            at: Utc::now(),
        }
    }

    /// Creates a disconnect entry.
    #[must_use]
    pub fn disconnected(user_id: u64, session_id: SessionId, detail: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id),
            kind: AuditKind::Disconnected,
            session_id: Some(session_id),
            detail: Some(detail.into()),
            at: Utc::now(),
        }
    }

    /// Creates an error entry.
    #[must_use]
    pub fn error(user_id: Option<u64>, detail: impl Into<String>) -> Self {
        Self {
            user_id,
            kind: AuditKind::Error,
            session_id: None,
            detail: Some(detail.into()),
            at: Utc::now(),
        }
    }
}

/// Audit write failure.
#[derive(Debug, Clone, thiserror::Error)]
#[error("audit write failed: {0}")]
pub struct AuditSinkError(pub String);

/// Destination for audit entries.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Records one entry.
    ///
    /// # Errors
    ///
    /// Returns an error when the write fails; callers treat this as
    /// best-effort and only log the failure.
    async fn record(&self, entry: AuditEntry) -> Result<(), AuditSinkError>;
}

/// Default sink: structured tracing events.
#[derive(Debug, Default, Clone)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, entry: AuditEntry) -> Result<(), AuditSinkError> {
        tracing::info!(
            target: "tradewire_hub::audit",
            kind = %entry.kind,
            user_id = entry.user_id,
            session = entry.session_id.map(|id| id.as_u64()),
            detail = entry.detail.as_deref().unwrap_or(""),
            "connection event"
        );
        Ok(())
    }
}
