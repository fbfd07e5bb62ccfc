//! Session credential verification.
//!
//! The hub validates a bearer token before a connection upgrade completes.
//! Verification itself is an external collaborator's concern, so the hub
//! only depends on the [`CredentialVerifier`] trait; the real implementation
//! is injected at construction.

use std::collections::HashMap;

use async_trait::async_trait;

/// Identity resolved from a valid credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Owning user id.
    pub user_id: u64,
    /// User-facing identifier.
    pub email: String,
}

impl Identity {
    /// Creates a new identity.
    #[must_use]
    pub fn new(user_id: u64, email: impl Into<String>) -> Self {
        Self {
            user_id,
            email: email.into(),
        }
    }
}

/// Authentication errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The token is missing, expired, or unknown.
    #[error("invalid token")]
    InvalidToken,
}

/// Verifies bearer credentials presented on connection upgrade.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Resolves a bearer token to an identity.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` when the token is not accepted.
    async fn verify(&self, token: &str) -> Result<Identity, AuthError>;
}

/// Verifier backed by a fixed token table.
///
/// Intended for development and tests; production deployments inject a
/// verifier backed by the platform's identity service.
#[derive(Debug, Default, Clone)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, Identity>,
}

impl StaticTokenVerifier {
    /// Creates an empty verifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a token for an identity.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>, identity: Identity) -> Self {
        self.tokens.insert(token.into(), identity);
        self
    }
}

#[async_trait]
impl CredentialVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }
}
