//! Entitlement Sync - Subscription and entitlement reconciliation service
//!
//! Consumes signed billing-provider webhooks, keeps a subscription ledger
//! per provider subscription, and projects each user's current plan and
//! active flag for the rest of the application to read.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
