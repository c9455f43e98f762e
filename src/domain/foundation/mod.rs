//! Foundation module - Shared domain primitives.
//!
//! Contains identifiers, timestamps, auth types and the error types
//! that form the vocabulary of the reconciliation domain.

mod auth;
mod errors;
mod ids;
mod timestamp;

pub use auth::{AuthError, AuthenticatedIdentity};
pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{SubscriptionRecordId, UserId};
pub use timestamp::Timestamp;
