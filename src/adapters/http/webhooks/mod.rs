//! Provider webhook endpoint.
//!
//! Unauthenticated; every delivery is checked against the signing secret
//! before anything is read from it.

mod dto;
mod handlers;
mod routes;

pub use dto::WebhookAck;
pub use handlers::{handle_stripe_webhook, WebhookApiError};
pub use routes::webhook_routes;
