//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the reconciliation core to external systems:
//! - `auth` - Bearer token verification (JWKS, legacy HS256, static)
//! - `http` - axum routes
//! - `memory` - In-memory store for tests and local runs
//! - `postgres` - PostgreSQL store

pub mod auth;
pub mod http;
pub mod memory;
pub mod postgres;
