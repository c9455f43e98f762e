//! ReconciliationStore port - Transactional storage for webhook reconciliation.
//!
//! One webhook delivery is one unit of work: resolve the user, apply the
//! ledger change, project the access flag, then commit once. A transaction
//! that is dropped without `commit` must leave no trace.
//!
//! # Locking
//!
//! `lock_subscription` must serialize concurrent deliveries for the same
//! business key (`SELECT ... FOR UPDATE` in Postgres). `insert_subscription`
//! must never raise on a uniqueness race; it reports `InsertResult::Conflict`
//! so the caller can re-read under lock and continue as an update.
//!
//! # Example
//!
//! ```ignore
//! let mut tx = store.begin().await?;
//! let user = tx.find_user_by_email(&email).await?;
//! // ... ledger and projection ...
//! tx.commit().await?;
//! ```

use async_trait::async_trait;

use crate::domain::billing::{AccessFlag, EmailAddress, Subscription, SubscriptionKey, User};
use crate::domain::foundation::{DomainError, UserId};

/// Outcome of inserting a subscription row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertResult {
    Inserted(Subscription),
    /// Another transaction holds the business key.
    Conflict,
}

/// Factory for reconciliation transactions.
#[async_trait]
pub trait ReconciliationStore: Send + Sync {
    /// Begins a new unit of work.
    async fn begin(&self) -> Result<Box<dyn ReconciliationTx>, DomainError>;
}

/// Operations available inside one reconciliation transaction.
#[async_trait]
pub trait ReconciliationTx: Send {
    /// Finds a user by normalized email.
    async fn find_user_by_email(&mut self, email: &EmailAddress) -> Result<Option<User>, DomainError>;

    /// Inserts a user unless the email is taken; returns whichever row owns the email.
    async fn insert_user(&mut self, user: &User) -> Result<User, DomainError>;

    /// Finds the user already bound to a provider customer id, through the
    /// most recently updated ledger row first, then a checkout binding.
    async fn find_user_by_customer_id(
        &mut self,
        provider: &str,
        customer_id: &str,
    ) -> Result<Option<UserId>, DomainError>;

    /// Records that a provider customer id belongs to a user. An existing
    /// binding for the customer is kept.
    async fn bind_customer(
        &mut self,
        provider: &str,
        customer_id: &str,
        user_id: &UserId,
    ) -> Result<(), DomainError>;

    /// Reads a subscription row and holds its lock until the transaction ends.
    async fn lock_subscription(
        &mut self,
        key: &SubscriptionKey,
    ) -> Result<Option<Subscription>, DomainError>;

    /// Inserts a new subscription row.
    async fn insert_subscription(
        &mut self,
        subscription: &Subscription,
    ) -> Result<InsertResult, DomainError>;

    /// Overwrites a locked subscription row.
    async fn update_subscription(&mut self, subscription: &Subscription) -> Result<(), DomainError>;

    /// Reads a user's access flag, serializing concurrent projections for that user.
    async fn find_access_flag(&mut self, user_id: &UserId) -> Result<Option<AccessFlag>, DomainError>;

    /// Inserts or replaces a user's access flag.
    async fn save_access_flag(&mut self, flag: &AccessFlag) -> Result<(), DomainError>;

    /// Makes every change visible atomically.
    async fn commit(self: Box<Self>) -> Result<(), DomainError>;
}
