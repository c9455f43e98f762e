//! Subscription ledger rows and the rules for applying changes to them.
//!
//! A subscription is keyed by (provider, provider subscription id). Each row
//! remembers the id and creation time of the last provider event applied to
//! it, which is what makes redelivery a no-op and lets stale events be
//! recognized.

use crate::domain::foundation::{SubscriptionRecordId, Timestamp, UserId};

use super::plan::Plan;
use super::status::SubscriptionStatus;

/// The only provider this service reconciles against.
pub const STRIPE_PROVIDER: &str = "stripe";

/// Business key of a subscription row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    pub provider: String,
    pub provider_subscription_id: String,
}

impl SubscriptionKey {
    pub fn stripe(provider_subscription_id: impl Into<String>) -> Self {
        Self {
            provider: STRIPE_PROVIDER.to_string(),
            provider_subscription_id: provider_subscription_id.into(),
        }
    }
}

/// A lifecycle event reduced to what the ledger stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionChange {
    pub event_id: String,
    pub event_created_at: Timestamp,
    pub key: SubscriptionKey,
    pub provider_customer_id: Option<String>,
    pub user_id: UserId,
    pub status: SubscriptionStatus,
    pub plan: Plan,
    pub current_period_end: Option<Timestamp>,
}

/// Durable subscription row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub id: SubscriptionRecordId,
    pub user_id: UserId,
    pub key: SubscriptionKey,
    pub provider_customer_id: Option<String>,
    pub plan: Plan,
    pub status: SubscriptionStatus,
    pub current_period_end: Option<Timestamp>,
    pub last_event_id: Option<String>,
    pub last_event_created_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// What the ledger should do with a change against an existing row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerDecision {
    /// Same event already applied.
    Deduplicate,
    /// A strictly newer event was already applied.
    Stale,
    /// Apply the change.
    Update,
}

impl Subscription {
    /// Builds the first row for a business key.
    pub fn from_change(change: &SubscriptionChange) -> Self {
        let now = Timestamp::now();
        Self {
            id: SubscriptionRecordId::new(),
            user_id: change.user_id,
            key: change.key.clone(),
            provider_customer_id: change.provider_customer_id.clone(),
            plan: change.plan.clone(),
            status: change.status,
            current_period_end: change.current_period_end,
            last_event_id: Some(change.event_id.clone()),
            last_event_created_at: Some(change.event_created_at),
            created_at: now,
            updated_at: now,
        }
    }

    /// Decides how a change relates to this row.
    ///
    /// Equal creation times are not stale; the later delivery wins.
    pub fn decide(&self, change: &SubscriptionChange) -> LedgerDecision {
        if self.last_event_id.as_deref() == Some(change.event_id.as_str()) {
            return LedgerDecision::Deduplicate;
        }
        match self.last_event_created_at {
            Some(applied) if applied.is_after(&change.event_created_at) => LedgerDecision::Stale,
            _ => LedgerDecision::Update,
        }
    }

    /// Applies a change in place.
    ///
    /// The owning user never changes. An unknown plan or a missing customer
    /// id leaves the stored value alone.
    pub fn apply(&mut self, change: &SubscriptionChange) {
        self.status = change.status;
        if change.plan.is_known() {
            self.plan = change.plan.clone();
        }
        if change.provider_customer_id.is_some() {
            self.provider_customer_id = change.provider_customer_id.clone();
        }
        self.current_period_end = change.current_period_end;
        self.last_event_id = Some(change.event_id.clone());
        self.last_event_created_at = Some(change.event_created_at);
        self.updated_at = Timestamp::now();
    }
}

/// Result of applying a change to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerOutcome {
    Created(Subscription),
    Updated(Subscription),
    Deduplicated(Subscription),
    Stale(Subscription),
}

impl LedgerOutcome {
    /// The row as it stands after the operation.
    pub fn subscription(&self) -> &Subscription {
        match self {
            LedgerOutcome::Created(s)
            | LedgerOutcome::Updated(s)
            | LedgerOutcome::Deduplicated(s)
            | LedgerOutcome::Stale(s) => s,
        }
    }

    /// True when the row was written and the access flag must follow.
    pub fn is_effective(&self) -> bool {
        matches!(self, LedgerOutcome::Created(_) | LedgerOutcome::Updated(_))
    }
}
