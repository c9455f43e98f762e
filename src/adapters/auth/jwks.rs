//! JWKS-backed identity verifier for OIDC bearer tokens.
//!
//! Validates a JWT by:
//!
//! 1. Reading `kid` from the header
//! 2. Looking the key up in the injected `KeySetCache`, refreshing once
//!    when the key is unknown (the provider may have rotated)
//! 3. Validating signature, expiry and, when configured, issuer and audience
//! 4. Mapping claims to `AuthenticatedIdentity`

use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::jwk::{Jwk, JwkSet, KeyAlgorithm};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Header, Validation};
use serde::Deserialize;

use crate::domain::foundation::{AuthError, AuthenticatedIdentity};
use crate::ports::{IdentityVerifier, KeySetCache};

/// Claims read from identity provider tokens.
///
/// Providers disagree on where the email lives, so every known spelling
/// is accepted.
#[derive(Debug, Deserialize)]
struct IdentityClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_address: Option<String>,
    #[serde(default)]
    primary_email_address: Option<String>,
}

impl IdentityClaims {
    fn into_identity(self) -> AuthenticatedIdentity {
        let email = [self.email, self.email_address, self.primary_email_address]
            .into_iter()
            .flatten()
            .find(|e| !e.trim().is_empty());
        AuthenticatedIdentity::new(self.sub, email)
    }
}

/// Verifies tokens signed by keys published as a JWKS.
pub struct JwksIdentityVerifier {
    keys: Arc<dyn KeySetCache>,
    issuer: Option<String>,
    audience: Option<String>,
}

impl JwksIdentityVerifier {
    pub fn new(keys: Arc<dyn KeySetCache>) -> Self {
        Self {
            keys,
            issuer: None,
            audience: None,
        }
    }

    /// Requires the `iss` claim to match.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Requires the `aud` claim to contain this value.
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Finds the key for `kid`, forcing one refresh if it is not cached.
    async fn find_jwk(&self, kid: &str) -> Result<Jwk, AuthError> {
        let current = self.keys.current().await?;
        if let Some(jwk) = current.find(kid) {
            return Ok(jwk.clone());
        }

        tracing::debug!(kid, "unknown key id, refreshing key set");
        let refreshed: JwkSet = self.keys.refresh().await?;
        refreshed.find(kid).cloned().ok_or_else(|| {
            tracing::warn!("No matching key found for kid: {}", kid);
            AuthError::InvalidToken
        })
    }

    fn decoding_key(jwk: &Jwk) -> Result<(DecodingKey, Algorithm), AuthError> {
        let algorithm = match &jwk.common.key_algorithm {
            Some(KeyAlgorithm::RS256) | None => Algorithm::RS256,
            Some(KeyAlgorithm::RS384) => Algorithm::RS384,
            Some(KeyAlgorithm::RS512) => Algorithm::RS512,
            Some(KeyAlgorithm::ES256) => Algorithm::ES256,
            Some(KeyAlgorithm::ES384) => Algorithm::ES384,
            Some(KeyAlgorithm::HS256) => Algorithm::HS256,
            Some(other) => {
                tracing::warn!("Unsupported algorithm: {:?}", other);
                return Err(AuthError::InvalidToken);
            }
        };

        let key = DecodingKey::from_jwk(jwk).map_err(|e| {
            tracing::warn!("Failed to create decoding key: {}", e);
            AuthError::InvalidToken
        })?;

        Ok((key, algorithm))
    }

    fn validation(&self, algorithm: Algorithm) -> Validation {
        let mut validation = Validation::new(algorithm);
        validation.set_required_spec_claims(&["exp", "sub"]);

        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }

        match &self.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        validation
    }
}

/// Maps jsonwebtoken failures onto `AuthError`.
pub(crate) fn map_jwt_error(err: jsonwebtoken::errors::Error) -> AuthError {
    use jsonwebtoken::errors::ErrorKind;
    match err.kind() {
        ErrorKind::ExpiredSignature => {
            tracing::debug!("Token expired");
            AuthError::TokenExpired
        }
        other => {
            tracing::debug!("Token rejected: {:?}", other);
            AuthError::InvalidToken
        }
    }
}

#[async_trait]
impl IdentityVerifier for JwksIdentityVerifier {
    async fn resolve_authenticated_identity(
        &self,
        bearer_token: &str,
    ) -> Result<AuthenticatedIdentity, AuthError> {
        let header: Header = decode_header(bearer_token).map_err(|e| {
            tracing::debug!("Failed to decode JWT header: {}", e);
            AuthError::InvalidToken
        })?;

        let kid = header.kid.as_deref().ok_or_else(|| {
            tracing::warn!("JWT missing 'kid' header");
            AuthError::InvalidToken
        })?;

        let jwk = self.find_jwk(kid).await?;
        let (key, algorithm) = Self::decoding_key(&jwk)?;

        if header.alg != algorithm {
            tracing::warn!("Token algorithm {:?} does not match key {:?}", header.alg, algorithm);
            return Err(AuthError::InvalidToken);
        }

        let data = decode::<IdentityClaims>(bearer_token, &key, &self.validation(algorithm))
            .map_err(map_jwt_error)?;

        Ok(data.claims.into_identity())
    }
}
