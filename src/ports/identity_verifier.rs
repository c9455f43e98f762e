//! Identity verification ports.
//!
//! The HTTP layer never inspects bearer tokens itself. It hands them to an
//! `IdentityVerifier`, which answers with the subject and email the token
//! carries. Key material for signature checks comes from a `KeySetCache`
//! injected into the verifier, so refresh policy is owned by the cache
//! rather than by process-wide state.

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;

use crate::domain::foundation::{AuthError, AuthenticatedIdentity};

/// Verifies bearer tokens.
///
/// # Contract
///
/// - `Ok(identity)` for a valid token
/// - `AuthError::InvalidToken` / `TokenExpired` for a rejected token
/// - `AuthError::ServiceUnavailable` when keys cannot be obtained
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn resolve_authenticated_identity(
        &self,
        bearer_token: &str,
    ) -> Result<AuthenticatedIdentity, AuthError>;
}

/// Source of verification keys with its own refresh policy.
#[async_trait]
pub trait KeySetCache: Send + Sync {
    /// Returns the cached key set, fetching it when absent or expired.
    async fn current(&self) -> Result<JwkSet, AuthError>;

    /// Fetches a fresh key set regardless of age.
    async fn refresh(&self) -> Result<JwkSet, AuthError>;
}

/// Fetches a key set from wherever it is published.
#[async_trait]
pub trait KeySetFetcher: Send + Sync {
    async fn fetch(&self) -> Result<JwkSet, AuthError>;
}
