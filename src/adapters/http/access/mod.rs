//! Access and account endpoints for authenticated users.

mod dto;
mod handlers;
mod routes;

pub use dto::{AccessCheckResponse, AccessResponse, AccountResponse};
pub use handlers::{get_access, get_me, verify_access, AccessApiError};
pub use routes::access_routes;
