//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (IDs, timestamps, errors, identity)
//! - `billing` - Webhook events, subscription ledger rules and access flags

pub mod billing;
pub mod foundation;
