//! Reconciliation handlers.
//!
//! Write side: `ReconcileWebhookHandler` composes the identity resolver,
//! subscription ledger and entitlement projector into one transaction.
//! Read side: access flag queries, the access gate and account lookup.

mod entitlement_projector;
mod get_access_flag;
mod get_account;
mod identity_resolver;
mod reconcile_webhook;
mod subscription_ledger;

pub use entitlement_projector::EntitlementProjector;
pub use get_access_flag::{AccessDenied, AccessGate, GetAccessFlagHandler, GetAccessFlagQuery};
pub use get_account::{AccountError, AccountView, GetAccountHandler};
pub use identity_resolver::IdentityResolver;
pub use reconcile_webhook::{ReconcileOutcome, ReconcileWebhookCommand, ReconcileWebhookHandler};
pub use subscription_ledger::SubscriptionLedger;
