//! HTTP handler for Stripe webhook deliveries.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::adapters::http::error::ErrorResponse;
use crate::adapters::http::state::AppState;
use crate::application::ReconcileWebhookCommand;
use crate::domain::billing::WebhookError;

use super::dto::WebhookAck;

const SIGNATURE_HEADER: &str = "Stripe-Signature";

/// POST /webhooks/stripe - Reconcile one delivery.
///
/// The body is passed through as raw bytes; the signature covers them
/// exactly.
pub async fn handle_stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, WebhookApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let cmd = ReconcileWebhookCommand {
        payload: body.to_vec(),
        signature,
    };

    let outcome = state.webhook_handler.handle(cmd).await?;

    Ok((StatusCode::OK, Json(WebhookAck::from(&outcome))))
}

/// API error type that converts webhook errors to HTTP responses.
#[derive(Debug)]
pub struct WebhookApiError(WebhookError);

impl From<WebhookError> for WebhookApiError {
    fn from(err: WebhookError) -> Self {
        Self(err)
    }
}

impl IntoResponse for WebhookApiError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "webhook delivery failed");
        }
        ErrorResponse::new(self.0.code(), self.0.to_string()).with_status(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_failure_renders_unauthorized() {
        let response =
            WebhookApiError::from(WebhookError::SignatureInvalid("no match".into())).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn missing_secret_renders_server_error() {
        let response = WebhookApiError::from(WebhookError::SecretNotConfigured).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn transient_failure_renders_server_error() {
        let response =
            WebhookApiError::from(WebhookError::TransientStoreFailure("pool timeout".into()))
                .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
