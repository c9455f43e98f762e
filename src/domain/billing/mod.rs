//! Billing domain - subscriptions, access flags and provider webhooks.
//!
//! Everything here is pure: parsing, verification and the decisions the
//! reconciliation engine makes. Persistence lives behind the ports.

mod access_flag;
mod classifier;
mod plan;
mod provider_event;
mod status;
mod subscription;
mod user;
mod webhook_errors;
mod webhook_verifier;

pub use access_flag::{AccessFlag, AccessFlagView};
pub use classifier::{classify, EventKind};
pub use plan::{Plan, PlanCatalog};
pub use provider_event::{CheckoutSnapshot, EventData, SubscriptionSnapshot, WebhookEvent};
pub use status::SubscriptionStatus;
pub use subscription::{
    LedgerDecision, LedgerOutcome, Subscription, SubscriptionChange, SubscriptionKey,
    STRIPE_PROVIDER,
};
pub use user::{Credential, EmailAddress, Role, User};
pub use webhook_errors::WebhookError;
pub use webhook_verifier::{
    compute_signature_hex, SignatureHeader, WebhookVerifier, DEFAULT_TOLERANCE_SECS,
};

#[cfg(test)]
pub(crate) use provider_event::WebhookEventBuilder;
#[cfg(test)]
pub(crate) use subscription::test_support;
