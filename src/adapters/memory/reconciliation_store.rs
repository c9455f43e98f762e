//! In-memory reconciliation store.
//!
//! A transaction holds the store lock for its whole life and works on a
//! staged copy of the state. `commit` swaps the copy in; dropping the
//! transaction discards it. Transactions are therefore fully serialized,
//! which is stricter than Postgres row locking but gives the same results.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::billing::{
    AccessFlag, AccessFlagView, EmailAddress, Subscription, SubscriptionKey, User,
};
use crate::domain::foundation::{DomainError, ErrorCode, UserId};
use crate::ports::{
    AccessFlagReader, InsertResult, ReconciliationStore, ReconciliationTx, StoreHealth,
    UserDirectory,
};

#[derive(Debug, Clone, Default)]
struct StoreState {
    users: HashMap<UserId, User>,
    subscriptions: HashMap<SubscriptionKey, Subscription>,
    customer_bindings: HashMap<(String, String), UserId>,
    access_flags: HashMap<UserId, AccessFlag>,
}

impl StoreState {
    fn user_by_email(&self, email: &EmailAddress) -> Option<&User> {
        self.users.values().find(|u| &u.email == email)
    }
}

/// Store backed by process memory, for tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryReconciliationStore {
    state: Arc<Mutex<StoreState>>,
    fail_next_commit: Arc<AtomicBool>,
}

impl InMemoryReconciliationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next transaction's commit fail, leaving state untouched.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Inserts a credentialed user directly.
    pub async fn seed_user(&self, email: &EmailAddress) -> User {
        let mut user = User::billing_only(email.clone());
        user.credential = crate::domain::billing::Credential::Password {
            hash: "seeded".to_string(),
        };
        self.state.lock().await.users.insert(user.id, user.clone());
        user
    }

    /// Inserts a subscription row directly.
    pub async fn seed_subscription(&self, subscription: Subscription) {
        self.state
            .lock()
            .await
            .subscriptions
            .insert(subscription.key.clone(), subscription);
    }

    pub async fn user_by_email(&self, email: &str) -> Option<User> {
        let email = EmailAddress::parse(email).ok()?;
        self.state.lock().await.user_by_email(&email).cloned()
    }

    pub async fn subscription(&self, key: &SubscriptionKey) -> Option<Subscription> {
        self.state.lock().await.subscriptions.get(key).cloned()
    }

    pub async fn subscription_count(&self) -> usize {
        self.state.lock().await.subscriptions.len()
    }

    pub async fn access_flag(&self, user_id: &UserId) -> Option<AccessFlag> {
        self.state.lock().await.access_flags.get(user_id).cloned()
    }
}

#[async_trait]
impl ReconciliationStore for InMemoryReconciliationStore {
    async fn begin(&self) -> Result<Box<dyn ReconciliationTx>, DomainError> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        let fail_commit = self.fail_next_commit.swap(false, Ordering::SeqCst);

        Ok(Box::new(InMemoryTx {
            guard,
            staged,
            fail_commit,
        }))
    }
}

struct InMemoryTx {
    guard: OwnedMutexGuard<StoreState>,
    staged: StoreState,
    fail_commit: bool,
}

#[async_trait]
impl ReconciliationTx for InMemoryTx {
    async fn find_user_by_email(&mut self, email: &EmailAddress) -> Result<Option<User>, DomainError> {
        Ok(self.staged.user_by_email(email).cloned())
    }

    async fn insert_user(&mut self, user: &User) -> Result<User, DomainError> {
        if let Some(existing) = self.staged.user_by_email(&user.email) {
            return Ok(existing.clone());
        }
        self.staged.users.insert(user.id, user.clone());
        Ok(user.clone())
    }

    async fn find_user_by_customer_id(
        &mut self,
        provider: &str,
        customer_id: &str,
    ) -> Result<Option<UserId>, DomainError> {
        let from_ledger = self
            .staged
            .subscriptions
            .values()
            .filter(|s| {
                s.key.provider == provider && s.provider_customer_id.as_deref() == Some(customer_id)
            })
            .max_by_key(|s| s.updated_at)
            .map(|s| s.user_id);

        Ok(from_ledger.or_else(|| {
            self.staged
                .customer_bindings
                .get(&(provider.to_string(), customer_id.to_string()))
                .copied()
        }))
    }

    async fn bind_customer(
        &mut self,
        provider: &str,
        customer_id: &str,
        user_id: &UserId,
    ) -> Result<(), DomainError> {
        self.staged
            .customer_bindings
            .entry((provider.to_string(), customer_id.to_string()))
            .or_insert(*user_id);
        Ok(())
    }

    async fn lock_subscription(
        &mut self,
        key: &SubscriptionKey,
    ) -> Result<Option<Subscription>, DomainError> {
        Ok(self.staged.subscriptions.get(key).cloned())
    }

    async fn insert_subscription(
        &mut self,
        subscription: &Subscription,
    ) -> Result<InsertResult, DomainError> {
        if self.staged.subscriptions.contains_key(&subscription.key) {
            return Ok(InsertResult::Conflict);
        }
        self.staged
            .subscriptions
            .insert(subscription.key.clone(), subscription.clone());
        Ok(InsertResult::Inserted(subscription.clone()))
    }

    async fn update_subscription(&mut self, subscription: &Subscription) -> Result<(), DomainError> {
        match self.staged.subscriptions.get_mut(&subscription.key) {
            Some(row) => {
                *row = subscription.clone();
                Ok(())
            }
            None => Err(DomainError::new(
                ErrorCode::SubscriptionNotFound,
                format!(
                    "subscription {} not found",
                    subscription.key.provider_subscription_id
                ),
            )),
        }
    }

    async fn find_access_flag(&mut self, user_id: &UserId) -> Result<Option<AccessFlag>, DomainError> {
        Ok(self.staged.access_flags.get(user_id).cloned())
    }

    async fn save_access_flag(&mut self, flag: &AccessFlag) -> Result<(), DomainError> {
        self.staged.access_flags.insert(flag.user_id, flag.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        if self.fail_commit {
            return Err(DomainError::database("commit failed"));
        }
        let InMemoryTx {
            mut guard, staged, ..
        } = *self;
        *guard = staged;
        Ok(())
    }
}

#[async_trait]
impl AccessFlagReader for InMemoryReconciliationStore {
    async fn get_access_flag(&self, user_id: &UserId) -> Result<AccessFlagView, DomainError> {
        Ok(self
            .state
            .lock()
            .await
            .access_flags
            .get(user_id)
            .map(AccessFlag::view)
            .unwrap_or_else(AccessFlagView::inactive))
    }
}

#[async_trait]
impl UserDirectory for InMemoryReconciliationStore {
    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<User>, DomainError> {
        Ok(self.state.lock().await.user_by_email(email).cloned())
    }
}

#[async_trait]
impl StoreHealth for InMemoryReconciliationStore {
    async fn ping(&self) -> Result<(), DomainError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::{test_support, SubscriptionStatus};
    use crate::domain::foundation::Timestamp;

    fn email(raw: &str) -> EmailAddress {
        EmailAddress::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn committed_changes_are_visible() {
        let store = InMemoryReconciliationStore::new();

        let mut tx = store.begin().await.unwrap();
        tx.insert_user(&User::billing_only(email("a@x.com"))).await.unwrap();
        tx.commit().await.unwrap();

        assert!(store.user_by_email("a@x.com").await.is_some());
    }

    #[tokio::test]
    async fn dropped_transaction_rolls_back() {
        let store = InMemoryReconciliationStore::new();

        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_user(&User::billing_only(email("a@x.com"))).await.unwrap();
        }

        assert!(store.user_by_email("a@x.com").await.is_none());
    }

    #[tokio::test]
    async fn failed_commit_rolls_back() {
        let store = InMemoryReconciliationStore::new();
        store.fail_next_commit();

        let mut tx = store.begin().await.unwrap();
        tx.insert_user(&User::billing_only(email("a@x.com"))).await.unwrap();
        assert!(tx.commit().await.is_err());

        assert!(store.user_by_email("a@x.com").await.is_none());
    }

    #[tokio::test]
    async fn insert_user_returns_existing_owner_of_email() {
        let store = InMemoryReconciliationStore::new();
        let seeded = store.seed_user(&email("a@x.com")).await;

        let mut tx = store.begin().await.unwrap();
        let returned = tx.insert_user(&User::billing_only(email("a@x.com"))).await.unwrap();

        assert_eq!(returned.id, seeded.id);
    }

    #[tokio::test]
    async fn duplicate_subscription_insert_conflicts() {
        let store = InMemoryReconciliationStore::new();
        let row = Subscription::from_change(&test_support::change("evt_1", 1, SubscriptionStatus::Active));

        let mut tx = store.begin().await.unwrap();
        assert!(matches!(
            tx.insert_subscription(&row).await.unwrap(),
            InsertResult::Inserted(_)
        ));
        assert_eq!(tx.insert_subscription(&row).await.unwrap(), InsertResult::Conflict);
    }

    #[tokio::test]
    async fn updating_missing_subscription_fails() {
        let store = InMemoryReconciliationStore::new();
        let row = Subscription::from_change(&test_support::change("evt_1", 1, SubscriptionStatus::Active));

        let mut tx = store.begin().await.unwrap();
        let err = tx.update_subscription(&row).await.unwrap_err();

        assert_eq!(err.code, ErrorCode::SubscriptionNotFound);
    }

    #[tokio::test]
    async fn customer_lookup_prefers_most_recently_updated_row() {
        let store = InMemoryReconciliationStore::new();
        let older = Subscription::from_change(&test_support::change("evt_1", 1, SubscriptionStatus::Canceled));
        let mut newer_change = test_support::change("evt_2", 2, SubscriptionStatus::Active);
        newer_change.key = SubscriptionKey::stripe("sub_2");
        let mut newer = Subscription::from_change(&newer_change);
        newer.updated_at = Timestamp::from_unix_secs(older.updated_at.as_unix_secs() + 60).unwrap();
        store.seed_subscription(older).await;
        store.seed_subscription(newer).await;

        let mut tx = store.begin().await.unwrap();
        let resolved = tx.find_user_by_customer_id("stripe", "cus_1").await.unwrap();

        assert_eq!(resolved, Some(newer_change.user_id));
    }

    #[tokio::test]
    async fn customer_binding_resolves_and_keeps_first_owner() {
        let store = InMemoryReconciliationStore::new();
        let first = UserId::new();

        let mut tx = store.begin().await.unwrap();
        tx.bind_customer("stripe", "cus_9", &first).await.unwrap();
        tx.bind_customer("stripe", "cus_9", &UserId::new()).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(
            tx.find_user_by_customer_id("stripe", "cus_9").await.unwrap(),
            Some(first)
        );
        assert_eq!(tx.find_user_by_customer_id("stripe", "cus_other").await.unwrap(), None);
    }

    #[tokio::test]
    async fn missing_flag_reads_inactive() {
        let store = InMemoryReconciliationStore::new();
        assert_eq!(
            store.get_access_flag(&UserId::new()).await.unwrap(),
            AccessFlagView::inactive()
        );
    }
}
