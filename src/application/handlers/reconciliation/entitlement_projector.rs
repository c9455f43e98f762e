//! Writes the per-user access flag inside the reconciliation transaction.

use crate::domain::billing::{AccessFlag, Plan, SubscriptionStatus};
use crate::domain::foundation::{DomainError, UserId};
use crate::ports::ReconciliationTx;

#[derive(Debug, Default, Clone, Copy)]
pub struct EntitlementProjector;

impl EntitlementProjector {
    /// Projects a reconciled status onto the user's flag.
    pub async fn project(
        &self,
        tx: &mut dyn ReconciliationTx,
        user_id: UserId,
        status: SubscriptionStatus,
        plan: &Plan,
    ) -> Result<AccessFlag, DomainError> {
        let previous = tx.find_access_flag(&user_id).await?;
        let flag = AccessFlag::project(previous.as_ref(), user_id, status, plan);
        tx.save_access_flag(&flag).await?;
        Ok(flag)
    }

    /// Activates the user right after checkout.
    pub async fn activate_on_checkout(
        &self,
        tx: &mut dyn ReconciliationTx,
        user_id: UserId,
        default_plan: &Plan,
    ) -> Result<AccessFlag, DomainError> {
        let previous = tx.find_access_flag(&user_id).await?;
        let flag = AccessFlag::activate_on_checkout(previous.as_ref(), user_id, default_plan);
        tx.save_access_flag(&flag).await?;
        Ok(flag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryReconciliationStore;
    use crate::ports::{AccessFlagReader, ReconciliationStore};

    #[tokio::test]
    async fn checkout_then_lifecycle_replaces_default_plan() {
        let store = InMemoryReconciliationStore::new();
        let user = UserId::new();

        let mut tx = store.begin().await.unwrap();
        EntitlementProjector
            .activate_on_checkout(tx.as_mut(), user, &Plan::Named("pro".to_string()))
            .await
            .unwrap();
        EntitlementProjector
            .project(
                tx.as_mut(),
                user,
                SubscriptionStatus::Active,
                &Plan::Named("enterprise".to_string()),
            )
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let view = store.get_access_flag(&user).await.unwrap();
        assert_eq!(view.plan.as_deref(), Some("enterprise"));
        assert!(view.is_active);
    }

    #[tokio::test]
    async fn uncommitted_projection_is_invisible() {
        let store = InMemoryReconciliationStore::new();
        let user = UserId::new();

        {
            let mut tx = store.begin().await.unwrap();
            EntitlementProjector
                .project(tx.as_mut(), user, SubscriptionStatus::Active, &Plan::Unknown)
                .await
                .unwrap();
        }

        let view = store.get_access_flag(&user).await.unwrap();
        assert!(!view.is_active);
    }
}
