//! Top-level router.

use std::time::Duration;

use axum::{middleware, routing::get, Router};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::access::access_routes;
use super::health::{health, ready};
use super::middleware::auth_middleware;
use super::state::AppState;
use super::webhooks::webhook_routes;

/// Builds the application router.
///
/// Bearer verification is layered on the access routes only; the webhook
/// authenticates by signature and the probes are open.
pub fn app_router(state: AppState, request_timeout: Duration) -> Router {
    let authenticated = access_routes().route_layer(middleware::from_fn_with_state(
        state.identity_verifier.clone(),
        auth_middleware,
    ));

    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .nest("/webhooks", webhook_routes())
        .merge(authenticated)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
