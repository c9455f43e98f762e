//! Application layer - Commands, Queries, and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Following CQRS, webhook reconciliation (write) is separate from access
//! and account queries (read).

pub mod handlers;

pub use handlers::reconciliation::{
    AccessDenied, AccessGate, AccountError, AccountView, GetAccessFlagHandler,
    GetAccessFlagQuery, GetAccountHandler, ReconcileOutcome, ReconcileWebhookCommand,
    ReconcileWebhookHandler,
};
