//! Applies lifecycle changes to the subscription ledger.

use crate::domain::billing::{LedgerDecision, LedgerOutcome, Subscription, SubscriptionChange};
use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::{InsertResult, ReconciliationTx};

/// Upserts one subscription row per business key.
///
/// The existing row is read under lock. A first-sight insert that loses a
/// uniqueness race is retried once as an update of the winner's row.
#[derive(Debug, Default, Clone, Copy)]
pub struct SubscriptionLedger;

impl SubscriptionLedger {
    pub async fn apply(
        &self,
        tx: &mut dyn ReconciliationTx,
        change: &SubscriptionChange,
    ) -> Result<LedgerOutcome, DomainError> {
        if let Some(existing) = tx.lock_subscription(&change.key).await? {
            return Self::apply_to_existing(tx, existing, change).await;
        }

        match tx.insert_subscription(&Subscription::from_change(change)).await? {
            InsertResult::Inserted(row) => Ok(LedgerOutcome::Created(row)),
            InsertResult::Conflict => {
                tracing::debug!(
                    subscription = %change.key.provider_subscription_id,
                    "lost insert race, retrying as update"
                );
                let existing = tx.lock_subscription(&change.key).await?.ok_or_else(|| {
                    DomainError::new(
                        ErrorCode::DatabaseError,
                        "subscription missing after insert conflict",
                    )
                })?;
                Self::apply_to_existing(tx, existing, change).await
            }
        }
    }

    async fn apply_to_existing(
        tx: &mut dyn ReconciliationTx,
        mut existing: Subscription,
        change: &SubscriptionChange,
    ) -> Result<LedgerOutcome, DomainError> {
        match existing.decide(change) {
            LedgerDecision::Deduplicate => Ok(LedgerOutcome::Deduplicated(existing)),
            LedgerDecision::Stale => Ok(LedgerOutcome::Stale(existing)),
            LedgerDecision::Update => {
                existing.apply(change);
                tx.update_subscription(&existing).await?;
                Ok(LedgerOutcome::Updated(existing))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryReconciliationStore;
    use crate::domain::billing::{
        test_support, AccessFlag, EmailAddress, SubscriptionKey, SubscriptionStatus, User,
    };
    use crate::domain::foundation::UserId;
    use crate::ports::ReconciliationStore;
    use async_trait::async_trait;
    use std::collections::VecDeque;

    #[tokio::test]
    async fn first_event_creates_row() {
        let store = InMemoryReconciliationStore::new();
        let change = test_support::change("evt_1", 100, SubscriptionStatus::Trialing);

        let mut tx = store.begin().await.unwrap();
        let outcome = SubscriptionLedger.apply(tx.as_mut(), &change).await.unwrap();
        tx.commit().await.unwrap();

        assert!(matches!(outcome, LedgerOutcome::Created(_)));
        assert_eq!(store.subscription_count().await, 1);
    }

    #[tokio::test]
    async fn redelivery_is_deduplicated() {
        let store = InMemoryReconciliationStore::new();
        let change = test_support::change("evt_1", 100, SubscriptionStatus::Trialing);

        let mut tx = store.begin().await.unwrap();
        let first = SubscriptionLedger.apply(tx.as_mut(), &change).await.unwrap();
        let second = SubscriptionLedger.apply(tx.as_mut(), &change).await.unwrap();
        tx.commit().await.unwrap();

        assert!(matches!(second, LedgerOutcome::Deduplicated(_)));
        assert_eq!(first.subscription(), second.subscription());
    }

    #[tokio::test]
    async fn newer_event_updates_and_older_is_stale() {
        let store = InMemoryReconciliationStore::new();
        let first = test_support::change("evt_1", 100, SubscriptionStatus::Trialing);
        let mut newer = test_support::change("evt_3", 300, SubscriptionStatus::Canceled);
        newer.user_id = first.user_id;
        let mut older = test_support::change("evt_2", 200, SubscriptionStatus::Active);
        older.user_id = first.user_id;

        let mut tx = store.begin().await.unwrap();
        SubscriptionLedger.apply(tx.as_mut(), &first).await.unwrap();
        let updated = SubscriptionLedger.apply(tx.as_mut(), &newer).await.unwrap();
        let stale = SubscriptionLedger.apply(tx.as_mut(), &older).await.unwrap();
        tx.commit().await.unwrap();

        assert!(matches!(updated, LedgerOutcome::Updated(_)));
        assert!(matches!(stale, LedgerOutcome::Stale(_)));
        assert_eq!(stale.subscription().status, SubscriptionStatus::Canceled);
        assert_eq!(stale.subscription().last_event_id.as_deref(), Some("evt_3"));
    }

    // ══════════════════════════════════════════════════════════════
    // Insert Race
    // ══════════════════════════════════════════════════════════════

    /// Scripted transaction: the first lock finds nothing, the insert
    /// conflicts, and the second lock sees the winner's row.
    struct RacingTx {
        locks: VecDeque<Option<Subscription>>,
        updated: Vec<Subscription>,
    }

    #[async_trait]
    impl ReconciliationTx for RacingTx {
        async fn find_user_by_email(&mut self, _: &EmailAddress) -> Result<Option<User>, DomainError> {
            Ok(None)
        }
        async fn insert_user(&mut self, user: &User) -> Result<User, DomainError> {
            Ok(user.clone())
        }
        async fn find_user_by_customer_id(&mut self, _: &str, _: &str) -> Result<Option<UserId>, DomainError> {
            Ok(None)
        }
        async fn bind_customer(&mut self, _: &str, _: &str, _: &UserId) -> Result<(), DomainError> {
            Ok(())
        }
        async fn lock_subscription(&mut self, _: &SubscriptionKey) -> Result<Option<Subscription>, DomainError> {
            Ok(self.locks.pop_front().flatten())
        }
        async fn insert_subscription(&mut self, _: &Subscription) -> Result<InsertResult, DomainError> {
            Ok(InsertResult::Conflict)
        }
        async fn update_subscription(&mut self, subscription: &Subscription) -> Result<(), DomainError> {
            self.updated.push(subscription.clone());
            Ok(())
        }
        async fn find_access_flag(&mut self, _: &UserId) -> Result<Option<AccessFlag>, DomainError> {
            Ok(None)
        }
        async fn save_access_flag(&mut self, _: &AccessFlag) -> Result<(), DomainError> {
            Ok(())
        }
        async fn commit(self: Box<Self>) -> Result<(), DomainError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn losing_insert_race_converts_to_update() {
        let winner = Subscription::from_change(&test_support::change("evt_a", 100, SubscriptionStatus::Trialing));
        let mut tx = RacingTx {
            locks: VecDeque::from([None, Some(winner.clone())]),
            updated: Vec::new(),
        };
        let loser = test_support::change("evt_b", 100, SubscriptionStatus::Active);

        let outcome = SubscriptionLedger.apply(&mut tx, &loser).await.unwrap();

        assert!(matches!(outcome, LedgerOutcome::Updated(_)));
        assert_eq!(outcome.subscription().id, winner.id);
        assert_eq!(outcome.subscription().status, SubscriptionStatus::Active);
        assert_eq!(tx.updated.len(), 1);
    }

    #[tokio::test]
    async fn conflict_without_row_is_an_error() {
        let mut tx = RacingTx {
            locks: VecDeque::from([None, None]),
            updated: Vec::new(),
        };
        let change = test_support::change("evt_a", 100, SubscriptionStatus::Active);

        let err = SubscriptionLedger.apply(&mut tx, &change).await.unwrap_err();

        assert_eq!(err.code, ErrorCode::DatabaseError);
    }
}
