//! Webhook error taxonomy.
//!
//! Every failure carries the HTTP status the provider should see. Non-2xx
//! responses make the provider redeliver, so only failures where a retry
//! can help map to 5xx.

use axum::http::StatusCode;
use thiserror::Error;

use crate::domain::foundation::DomainError;

/// Errors that occur while reconciling a webhook delivery.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Signature header missing, malformed, or not matching.
    #[error("Invalid signature: {0}")]
    SignatureInvalid(String),

    /// Signed timestamp is too old or too far in the future.
    #[error("Timestamp out of range")]
    TimestampOutOfRange,

    /// Authentic payload that is not a usable event. Acknowledged, since
    /// redelivering the same bytes cannot change the result.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// No signing secret configured. Operator error; never skip verification.
    #[error("Webhook secret not configured")]
    SecretNotConfigured,

    /// No local user could be tied to the event.
    #[error("Identity unresolved for event {0}")]
    IdentityUnresolved(String),

    /// Event was already applied.
    #[error("Duplicate event: {0}")]
    DuplicateEvent(String),

    /// Event type is not reconciled.
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    /// Store failed after the unit of work began; nothing was committed.
    #[error("Transient store failure: {0}")]
    TransientStoreFailure(String),
}

impl WebhookError {
    /// Returns true if the provider should redeliver this webhook.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WebhookError::TransientStoreFailure(_))
    }

    /// Returns true if the delivery should still be acknowledged with 2xx.
    pub fn is_acknowledged(&self) -> bool {
        self.status_code().is_success()
    }

    /// Maps the error to the HTTP status returned to the provider.
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::SignatureInvalid(_) => StatusCode::UNAUTHORIZED,

            WebhookError::TimestampOutOfRange => StatusCode::BAD_REQUEST,

            WebhookError::MalformedPayload(_)
            | WebhookError::IdentityUnresolved(_)
            | WebhookError::DuplicateEvent(_)
            | WebhookError::UnknownEventType(_) => StatusCode::OK,

            WebhookError::SecretNotConfigured | WebhookError::TransientStoreFailure(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable code for response bodies.
    pub fn code(&self) -> &'static str {
        match self {
            WebhookError::SignatureInvalid(_) => "SIGNATURE_INVALID",
            WebhookError::TimestampOutOfRange => "TIMESTAMP_OUT_OF_RANGE",
            WebhookError::MalformedPayload(_) => "MALFORMED_PAYLOAD",
            WebhookError::SecretNotConfigured => "SECRET_NOT_CONFIGURED",
            WebhookError::IdentityUnresolved(_) => "IDENTITY_UNRESOLVED",
            WebhookError::DuplicateEvent(_) => "DUPLICATE_EVENT",
            WebhookError::UnknownEventType(_) => "UNKNOWN_EVENT_TYPE",
            WebhookError::TransientStoreFailure(_) => "TRANSIENT_STORE_FAILURE",
        }
    }
}

impl From<DomainError> for WebhookError {
    fn from(err: DomainError) -> Self {
        WebhookError::TransientStoreFailure(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ══════════════════════════════════════════════════════════════
    // Status Code Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn signature_failure_is_unauthorized() {
        let err = WebhookError::SignatureInvalid("mismatch".to_string());
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn stale_timestamp_is_bad_request() {
        assert_eq!(WebhookError::TimestampOutOfRange.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn missing_secret_is_server_error() {
        assert_eq!(
            WebhookError::SecretNotConfigured.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn terminal_success_variants_are_acknowledged() {
        assert!(WebhookError::IdentityUnresolved("evt_1".to_string()).is_acknowledged());
        assert!(WebhookError::DuplicateEvent("evt_1".to_string()).is_acknowledged());
        assert!(WebhookError::UnknownEventType("invoice.paid".to_string()).is_acknowledged());
        assert!(WebhookError::MalformedPayload("missing field `id`".to_string()).is_acknowledged());
    }

    // ══════════════════════════════════════════════════════════════
    // Retryability Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn only_store_failures_are_retryable() {
        assert!(WebhookError::TransientStoreFailure("timeout".to_string()).is_retryable());
        assert!(!WebhookError::SecretNotConfigured.is_retryable());
        assert!(!WebhookError::SignatureInvalid("x".to_string()).is_retryable());
        assert!(!WebhookError::DuplicateEvent("evt".to_string()).is_retryable());
    }

    #[test]
    fn domain_error_converts_to_store_failure() {
        let err: WebhookError = DomainError::database("connection reset").into();
        assert!(matches!(err, WebhookError::TransientStoreFailure(_)));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn display_includes_context() {
        let err = WebhookError::UnknownEventType("invoice.paid".to_string());
        assert_eq!(format!("{}", err), "Unknown event type: invoice.paid");
    }
}
