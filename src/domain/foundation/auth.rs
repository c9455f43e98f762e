//! Authentication types for the domain layer.
//!
//! These types describe the result of verifying a bearer token. They have
//! **no provider dependencies**: a JWKS-backed OIDC verifier and the legacy
//! HS256 verifier both populate them via the `IdentityVerifier` port.

use thiserror::Error;

/// Identity extracted from a verified bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedIdentity {
    /// Subject claim as issued by the identity provider.
    pub subject: String,

    /// Email address carried by the token, if any.
    pub email: Option<String>,
}

impl AuthenticatedIdentity {
    /// Creates a new authenticated identity.
    pub fn new(subject: impl Into<String>, email: Option<String>) -> Self {
        Self {
            subject: subject.into(),
            email,
        }
    }
}

/// Authentication errors that can occur during token verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The token is missing, malformed, or has an invalid signature.
    #[error("Invalid or expired token")]
    InvalidToken,

    /// The token has expired.
    #[error("Token expired")]
    TokenExpired,

    /// Token is valid but no local user matches it.
    #[error("User not found")]
    UserNotFound,

    /// The key source or identity provider is unreachable.
    #[error("Auth service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AuthError {
    /// Creates a service unavailable error with a message.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable(message.into())
    }

    /// Returns true if this is a transient error that may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, AuthError::ServiceUnavailable(_))
    }
}
