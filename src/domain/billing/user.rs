//! Local user accounts as seen by the reconciliation engine.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{Timestamp, UserId, ValidationError};

/// Normalized email address (trimmed, lower-cased).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Normalizes and validates an email address.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for blank input or input without `@`.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(ValidationError::empty_field("email"));
        }
        if !normalized.contains('@') {
            return Err(ValidationError::invalid_format("email", "missing @"));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for EmailAddress {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<EmailAddress> for String {
    fn from(email: EmailAddress) -> Self {
        email.0
    }
}

/// How a user may sign in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Regular account with a password hash owned by the auth collaborator.
    Password { hash: String },
    /// Shadow account created for a paying customer with no local account.
    BillingOnly,
}

impl Credential {
    pub fn is_billing_only(&self) -> bool {
        matches!(self, Credential::BillingOnly)
    }
}

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// Local user record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub email: EmailAddress,
    pub credential: Credential,
    pub role: Role,
    pub created_at: Timestamp,
}

impl User {
    /// Creates the shadow account for a customer seen only through billing.
    pub fn billing_only(email: EmailAddress) -> Self {
        Self {
            id: UserId::new(),
            email,
            credential: Credential::BillingOnly,
            role: Role::User,
            created_at: Timestamp::now(),
        }
    }
}
