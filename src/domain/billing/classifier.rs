//! Maps provider event type strings to the handling path.

use serde::Serialize;

/// Handling path for a verified event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Subscription created, updated, deleted, paused, resumed or nearing trial end.
    Lifecycle,
    /// Checkout session finished; activates access ahead of the lifecycle event.
    CheckoutCompleted,
    /// Acknowledged without any effect.
    Ignored,
}

const LIFECYCLE_TYPES: &[&str] = &[
    "customer.subscription.created",
    "customer.subscription.updated",
    "customer.subscription.deleted",
    "customer.subscription.paused",
    "customer.subscription.resumed",
    "customer.subscription.trial_will_end",
];

const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

/// Classifies an event type. Total: every string maps to a kind.
pub fn classify(event_type: &str) -> EventKind {
    if LIFECYCLE_TYPES.contains(&event_type) {
        EventKind::Lifecycle
    } else if event_type == CHECKOUT_COMPLETED {
        EventKind::CheckoutCompleted
    } else {
        EventKind::Ignored
    }
}
