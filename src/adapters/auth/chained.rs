//! Tries a primary verifier, then a fallback.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::foundation::{AuthError, AuthenticatedIdentity};
use crate::ports::IdentityVerifier;

/// Falls back only when the primary rejects the token.
///
/// A transient failure of the primary is returned as is, so an outage of
/// the identity provider is not masked by the fallback's rejection.
pub struct ChainedIdentityVerifier {
    primary: Arc<dyn IdentityVerifier>,
    fallback: Arc<dyn IdentityVerifier>,
}

impl ChainedIdentityVerifier {
    pub fn new(primary: Arc<dyn IdentityVerifier>, fallback: Arc<dyn IdentityVerifier>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl IdentityVerifier for ChainedIdentityVerifier {
    async fn resolve_authenticated_identity(
        &self,
        bearer_token: &str,
    ) -> Result<AuthenticatedIdentity, AuthError> {
        match self.primary.resolve_authenticated_identity(bearer_token).await {
            Ok(identity) => Ok(identity),
            Err(err) if err.is_transient() => Err(err),
            Err(primary_err) => self
                .fallback
                .resolve_authenticated_identity(bearer_token)
                .await
                .map_err(|fallback_err| {
                    tracing::debug!(%primary_err, %fallback_err, "both verifiers rejected token");
                    primary_err
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::auth::StaticIdentityVerifier;

    fn identity(email: &str) -> AuthenticatedIdentity {
        AuthenticatedIdentity::new(email, Some(email.to_string()))
    }

    #[tokio::test]
    async fn primary_wins_when_valid() {
        let primary = StaticIdentityVerifier::new().with_token("t", identity("a@x.com"));
        let fallback = StaticIdentityVerifier::new().with_token("t", identity("b@x.com"));
        let chain = ChainedIdentityVerifier::new(Arc::new(primary), Arc::new(fallback));

        let resolved = chain.resolve_authenticated_identity("t").await.unwrap();

        assert_eq!(resolved.email.as_deref(), Some("a@x.com"));
    }

    #[tokio::test]
    async fn fallback_used_after_rejection() {
        let primary = StaticIdentityVerifier::new();
        let fallback = StaticIdentityVerifier::new().with_token("t", identity("b@x.com"));
        let chain = ChainedIdentityVerifier::new(Arc::new(primary), Arc::new(fallback));

        let resolved = chain.resolve_authenticated_identity("t").await.unwrap();

        assert_eq!(resolved.email.as_deref(), Some("b@x.com"));
    }

    #[tokio::test]
    async fn transient_primary_failure_is_not_masked() {
        let primary =
            StaticIdentityVerifier::new().with_error(AuthError::service_unavailable("jwks down"));
        let fallback = StaticIdentityVerifier::new().with_token("t", identity("b@x.com"));
        let chain = ChainedIdentityVerifier::new(Arc::new(primary), Arc::new(fallback));

        let err = chain.resolve_authenticated_identity("t").await.unwrap_err();

        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn both_rejecting_returns_primary_error() {
        let primary = StaticIdentityVerifier::new().with_error(AuthError::TokenExpired);
        let chain = ChainedIdentityVerifier::new(
            Arc::new(primary),
            Arc::new(StaticIdentityVerifier::new()),
        );

        let err = chain.resolve_authenticated_identity("t").await.unwrap_err();

        assert_eq!(err, AuthError::TokenExpired);
    }
}
