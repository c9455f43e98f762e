//! Per-user access flag.
//!
//! The flag is a projection of the subscription ledger. It is only ever
//! produced by the two pure functions below; storage just persists them.

use serde::Serialize;

use crate::domain::foundation::{Timestamp, UserId};

use super::plan::Plan;
use super::status::SubscriptionStatus;

/// Stored access flag for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessFlag {
    pub user_id: UserId,
    pub plan: Plan,
    pub is_active: bool,
    pub updated_at: Timestamp,
}

impl AccessFlag {
    /// Projects a reconciled subscription status onto the flag.
    ///
    /// An unknown plan keeps whatever plan the previous flag carried.
    pub fn project(
        previous: Option<&AccessFlag>,
        user_id: UserId,
        status: SubscriptionStatus,
        plan: &Plan,
    ) -> Self {
        let plan = match (plan, previous) {
            (Plan::Unknown, Some(prev)) => prev.plan.clone(),
            (plan, _) => plan.clone(),
        };

        Self {
            user_id,
            plan,
            is_active: status.grants_access(),
            updated_at: Timestamp::now(),
        }
    }

    /// Checkout fast path: activate immediately, pending the lifecycle event.
    ///
    /// The plan is only written when there is no known plan yet.
    pub fn activate_on_checkout(
        previous: Option<&AccessFlag>,
        user_id: UserId,
        default_plan: &Plan,
    ) -> Self {
        let plan = match previous {
            Some(prev) if prev.plan.is_known() => prev.plan.clone(),
            _ => default_plan.clone(),
        };

        Self {
            user_id,
            plan,
            is_active: true,
            updated_at: Timestamp::now(),
        }
    }

    pub fn view(&self) -> AccessFlagView {
        AccessFlagView {
            plan: self.plan.name().map(str::to_string),
            is_active: self.is_active,
        }
    }
}

/// Read model returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessFlagView {
    pub plan: Option<String>,
    pub is_active: bool,
}

impl AccessFlagView {
    /// The view for a user with no flag.
    pub fn inactive() -> Self {
        Self {
            plan: None,
            is_active: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pro() -> Plan {
        Plan::Named("pro".to_string())
    }

    #[test]
    fn project_follows_status() {
        let user = UserId::new();

        let trialing = AccessFlag::project(None, user, SubscriptionStatus::Trialing, &pro());
        assert!(trialing.is_active);

        let canceled = AccessFlag::project(Some(&trialing), user, SubscriptionStatus::Canceled, &pro());
        assert!(!canceled.is_active);
        assert_eq!(canceled.plan, pro());
    }

    #[test]
    fn project_keeps_previous_plan_when_unknown() {
        let user = UserId::new();
        let prev = AccessFlag::project(None, user, SubscriptionStatus::Active, &pro());

        let next = AccessFlag::project(Some(&prev), user, SubscriptionStatus::PastDue, &Plan::Unknown);

        assert_eq!(next.plan, pro());
        assert!(!next.is_active);
    }

    #[test]
    fn project_replaces_known_plan() {
        let user = UserId::new();
        let prev = AccessFlag::activate_on_checkout(None, user, &pro());

        let enterprise = Plan::Named("enterprise".to_string());
        let next = AccessFlag::project(Some(&prev), user, SubscriptionStatus::Active, &enterprise);

        assert_eq!(next.plan, enterprise);
    }

    #[test]
    fn checkout_sets_plan_on_first_write() {
        let flag = AccessFlag::activate_on_checkout(None, UserId::new(), &pro());

        assert!(flag.is_active);
        assert_eq!(flag.view().plan.as_deref(), Some("pro"));
    }

    #[test]
    fn checkout_never_overwrites_known_plan() {
        let user = UserId::new();
        let enterprise = Plan::Named("enterprise".to_string());
        let prev = AccessFlag::project(None, user, SubscriptionStatus::Canceled, &enterprise);

        let flag = AccessFlag::activate_on_checkout(Some(&prev), user, &pro());

        assert!(flag.is_active);
        assert_eq!(flag.plan, enterprise);
    }

    #[test]
    fn unknown_plan_views_as_none() {
        let flag = AccessFlag::project(None, UserId::new(), SubscriptionStatus::Active, &Plan::Unknown);
        assert_eq!(flag.view(), AccessFlagView { plan: None, is_active: true });
    }
}
