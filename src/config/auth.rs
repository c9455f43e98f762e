//! Authentication configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use super::server::Environment;

/// Bearer token verification settings
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// JWKS endpoint of the identity provider
    pub jwks_url: Option<String>,

    /// Expected `iss` claim
    pub issuer: Option<String>,

    /// Expected `aud` claim
    pub audience: Option<String>,

    /// JWKS cache TTL in seconds
    #[serde(default = "default_jwks_cache_ttl")]
    pub jwks_cache_ttl_secs: u64,

    /// Minimum seconds between forced JWKS refreshes on unknown key ids
    #[serde(default = "default_jwks_refresh_cooldown")]
    pub jwks_refresh_cooldown_secs: u64,

    /// Accept HS256 tokens whose subject is the user's email
    #[serde(default)]
    pub allow_legacy_tokens: bool,

    pub legacy_jwt_secret: Option<SecretString>,
}

impl AuthConfig {
    pub fn jwks_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.jwks_cache_ttl_secs)
    }

    pub fn jwks_refresh_cooldown(&self) -> Duration {
        Duration::from_secs(self.jwks_refresh_cooldown_secs)
    }

    /// Legacy secret, only when legacy tokens are enabled.
    pub fn legacy_secret(&self) -> Option<&SecretString> {
        if self.allow_legacy_tokens {
            self.legacy_jwt_secret.as_ref()
        } else {
            None
        }
    }

    /// Validate authentication configuration
    ///
    /// At least one verifier must be configured. Production requires HTTPS
    /// for the JWKS endpoint.
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        let jwks_url = self.jwks_url.as_deref().filter(|u| !u.is_empty());

        if self.allow_legacy_tokens
            && self
                .legacy_jwt_secret
                .as_ref()
                .map_or(true, |s| s.expose_secret().is_empty())
        {
            return Err(ValidationError::MissingRequired("AUTH__LEGACY_JWT_SECRET"));
        }
        if jwks_url.is_none() && !self.allow_legacy_tokens {
            return Err(ValidationError::MissingRequired("AUTH__JWKS_URL"));
        }
        if let Some(url) = jwks_url {
            if *environment == Environment::Production && !url.starts_with("https://") {
                return Err(ValidationError::JwksUrlMustBeHttps);
            }
        }
        Ok(())
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwks_url: None,
            issuer: None,
            audience: None,
            jwks_cache_ttl_secs: default_jwks_cache_ttl(),
            jwks_refresh_cooldown_secs: default_jwks_refresh_cooldown(),
            allow_legacy_tokens: false,
            legacy_jwt_secret: None,
        }
    }
}

fn default_jwks_cache_ttl() -> u64 {
    3600
}

fn default_jwks_refresh_cooldown() -> u64 {
    30
}
