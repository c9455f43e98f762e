//! HTTP adapters - axum routes over the application handlers.
//!
//! - `webhooks` - Signed provider deliveries
//! - `access` - Access flag, access gate and account for bearer-authenticated callers
//! - `health` - Liveness and readiness probes
//! - `middleware` - Bearer token verification

pub mod access;
mod error;
pub mod health;
pub mod middleware;
mod router;
mod state;
pub mod webhooks;

pub use error::ErrorResponse;
pub use router::app_router;
pub use state::AppState;
