//! Fixed token-to-identity map for tests and local development.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::foundation::{AuthError, AuthenticatedIdentity};
use crate::ports::IdentityVerifier;

/// Tokens not in the map return `InvalidToken`.
#[derive(Debug, Default)]
pub struct StaticIdentityVerifier {
    tokens: RwLock<HashMap<String, AuthenticatedIdentity>>,
    force_error: Option<AuthError>,
}

impl StaticIdentityVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts `token` as `identity`.
    pub fn with_token(self, token: impl Into<String>, identity: AuthenticatedIdentity) -> Self {
        if let Ok(mut tokens) = self.tokens.write() {
            tokens.insert(token.into(), identity);
        }
        self
    }

    /// Accepts `token` as a user identified only by email.
    pub fn with_email(self, token: impl Into<String>, email: &str) -> Self {
        self.with_token(token, AuthenticatedIdentity::new(email, Some(email.to_string())))
    }

    /// Fails every verification with `error`.
    pub fn with_error(mut self, error: AuthError) -> Self {
        self.force_error = Some(error);
        self
    }
}

#[async_trait]
impl IdentityVerifier for StaticIdentityVerifier {
    async fn resolve_authenticated_identity(
        &self,
        bearer_token: &str,
    ) -> Result<AuthenticatedIdentity, AuthError> {
        if let Some(err) = &self.force_error {
            return Err(err.clone());
        }

        let tokens = self
            .tokens
            .read()
            .map_err(|_| AuthError::service_unavailable("token map poisoned"))?;

        tokens.get(bearer_token).cloned().ok_or(AuthError::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn known_token_resolves() {
        let verifier = StaticIdentityVerifier::new().with_email("tok", "a@x.com");

        let identity = verifier.resolve_authenticated_identity("tok").await.unwrap();

        assert_eq!(identity.email.as_deref(), Some("a@x.com"));
    }

    #[tokio::test]
    async fn unknown_token_is_invalid() {
        let verifier = StaticIdentityVerifier::new();

        let err = verifier.resolve_authenticated_identity("nope").await.unwrap_err();

        assert_eq!(err, AuthError::InvalidToken);
    }
}
