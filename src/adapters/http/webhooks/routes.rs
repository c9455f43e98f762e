//! Axum router for webhook endpoints.

use axum::{routing::post, Router};

use crate::adapters::http::state::AppState;

use super::handlers::handle_stripe_webhook;

/// Webhook routes, mounted at `/webhooks`.
///
/// # Routes
/// - `POST /stripe` - Reconcile a Stripe delivery
pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/stripe", post(handle_stripe_webhook))
}
