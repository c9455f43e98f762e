//! Legacy HS256 session tokens.
//!
//! Tokens issued by the old password login carry the account email as
//! `sub`. Accepted only while `allow_legacy_tokens` is on.

use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::domain::foundation::{AuthError, AuthenticatedIdentity};
use crate::ports::IdentityVerifier;

use super::jwks::map_jwt_error;

#[derive(Debug, Deserialize)]
struct LegacyClaims {
    sub: String,
}

pub struct LegacyTokenVerifier {
    key: DecodingKey,
}

impl LegacyTokenVerifier {
    pub fn new(secret: &SecretString) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.expose_secret().as_bytes()),
        }
    }
}

#[async_trait]
impl IdentityVerifier for LegacyTokenVerifier {
    async fn resolve_authenticated_identity(
        &self,
        bearer_token: &str,
    ) -> Result<AuthenticatedIdentity, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;

        let data = decode::<LegacyClaims>(bearer_token, &self.key, &validation).map_err(map_jwt_error)?;

        let email = data.claims.sub;
        if email.trim().is_empty() {
            return Err(AuthError::InvalidToken);
        }

        Ok(AuthenticatedIdentity::new(email.clone(), Some(email)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    const SECRET: &str = "legacy-secret";

    fn verifier() -> LegacyTokenVerifier {
        LegacyTokenVerifier::new(&SecretString::new(SECRET.to_string()))
    }

    fn token(secret: &str, claims: serde_json::Value) -> String {
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    fn exp() -> i64 {
        chrono::Utc::now().timestamp() + 600
    }

    #[tokio::test]
    async fn subject_is_the_email() {
        let jwt = token(SECRET, json!({"sub": "carol@x.com", "exp": exp()}));

        let identity = verifier().resolve_authenticated_identity(&jwt).await.unwrap();

        assert_eq!(identity.subject, "carol@x.com");
        assert_eq!(identity.email.as_deref(), Some("carol@x.com"));
    }

    #[tokio::test]
    async fn wrong_secret_is_invalid() {
        let jwt = token("other-secret", json!({"sub": "carol@x.com", "exp": exp()}));

        let err = verifier().resolve_authenticated_identity(&jwt).await.unwrap_err();

        assert_eq!(err, AuthError::InvalidToken);
    }

    #[tokio::test]
    async fn missing_exp_is_invalid() {
        let jwt = token(SECRET, json!({"sub": "carol@x.com"}));

        let err = verifier().resolve_authenticated_identity(&jwt).await.unwrap_err();

        assert_eq!(err, AuthError::InvalidToken);
    }
}
