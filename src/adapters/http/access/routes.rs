//! Axum router for access endpoints.

use axum::{routing::get, Router};

use crate::adapters::http::state::AppState;

use super::handlers::{get_access, get_me, verify_access};

/// Access routes. All require a bearer token.
///
/// # Routes
/// - `GET /access` - Current plan and active flag
/// - `GET /access/verify` - 200 for an active plan, 403 otherwise
/// - `GET /me` - Account with entitlement
pub fn access_routes() -> Router<AppState> {
    Router::new()
        .route("/access", get(get_access))
        .route("/access/verify", get(verify_access))
        .route("/me", get(get_me))
}
