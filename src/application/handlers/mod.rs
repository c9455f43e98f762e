//! Command and query handlers.

pub mod reconciliation;
