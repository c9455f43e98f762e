//! PostgreSQL implementation of the reconciliation ports.
//!
//! Each `begin` opens a sqlx transaction. Dropping it without `commit`
//! rolls back, which is what happens when a request future is cancelled.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::billing::{
    AccessFlag, AccessFlagView, Credential, EmailAddress, Plan, Role, Subscription,
    SubscriptionKey, SubscriptionStatus, User,
};
use crate::domain::foundation::{DomainError, ErrorCode, SubscriptionRecordId, Timestamp, UserId};
use crate::ports::{
    AccessFlagReader, InsertResult, ReconciliationStore, ReconciliationTx, StoreHealth,
    UserDirectory,
};

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PostgresReconciliationStore {
    pool: PgPool,
}

impl PostgresReconciliationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Rows
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    password_hash: Option<String>,
    role: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = DomainError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = EmailAddress::parse(&row.email).map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid stored email: {}", e))
        })?;
        let role = Role::parse(&row.role).ok_or_else(|| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid role value: {}", row.role))
        })?;
        let credential = match row.password_hash {
            Some(hash) => Credential::Password { hash },
            None => Credential::BillingOnly,
        };

        Ok(User {
            id: UserId::from_uuid(row.id),
            email,
            credential,
            role,
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    id: Uuid,
    user_id: Uuid,
    provider: String,
    provider_subscription_id: String,
    provider_customer_id: Option<String>,
    plan: String,
    status: String,
    current_period_end: Option<DateTime<Utc>>,
    last_event_id: Option<String>,
    last_event_created_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = DomainError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let status = SubscriptionStatus::parse_stored(&row.status).ok_or_else(|| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid status value: {}", row.status))
        })?;

        Ok(Subscription {
            id: SubscriptionRecordId::from_uuid(row.id),
            user_id: UserId::from_uuid(row.user_id),
            key: SubscriptionKey {
                provider: row.provider,
                provider_subscription_id: row.provider_subscription_id,
            },
            provider_customer_id: row.provider_customer_id,
            plan: Plan::from_label(&row.plan),
            status,
            current_period_end: row.current_period_end.map(Timestamp::from_datetime),
            last_event_id: row.last_event_id,
            last_event_created_at: row.last_event_created_at.map(Timestamp::from_datetime),
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AccessFlagRow {
    user_id: Uuid,
    plan: String,
    is_active: bool,
    updated_at: DateTime<Utc>,
}

impl From<AccessFlagRow> for AccessFlag {
    fn from(row: AccessFlagRow) -> Self {
        AccessFlag {
            user_id: UserId::from_uuid(row.user_id),
            plan: Plan::from_label(&row.plan),
            is_active: row.is_active,
            updated_at: Timestamp::from_datetime(row.updated_at),
        }
    }
}

fn password_hash(credential: &Credential) -> Option<&str> {
    match credential {
        Credential::Password { hash } => Some(hash.as_str()),
        Credential::BillingOnly => None,
    }
}

fn db_error(action: &'static str) -> impl FnOnce(sqlx::Error) -> DomainError {
    move |e| {
        let constraint = e
            .as_database_error()
            .and_then(|db| db.constraint())
            .map(str::to_string);
        let err = DomainError::database(format!("Failed to {}: {}", action, e)).with_detail("action", action);
        match constraint {
            Some(constraint) => err.with_detail("constraint", constraint),
            None => err,
        }
    }
}

const USER_COLUMNS: &str = "id, email, password_hash, role, created_at";

const SUBSCRIPTION_COLUMNS: &str = "id, user_id, provider, provider_subscription_id, \
     provider_customer_id, plan, status, current_period_end, last_event_id, \
     last_event_created_at, created_at, updated_at";

// ════════════════════════════════════════════════════════════════════════════
// Transaction
// ════════════════════════════════════════════════════════════════════════════

struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl ReconciliationStore for PostgresReconciliationStore {
    async fn begin(&self) -> Result<Box<dyn ReconciliationTx>, DomainError> {
        let tx = self.pool.begin().await.map_err(db_error("begin transaction"))?;
        Ok(Box::new(PostgresTx { tx }))
    }
}

#[async_trait]
impl ReconciliationTx for PostgresTx {
    async fn find_user_by_email(&mut self, email: &EmailAddress) -> Result<Option<User>, DomainError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS))
                .bind(email.as_str())
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(db_error("find user by email"))?;

        row.map(User::try_from).transpose()
    }

    async fn insert_user(&mut self, user: &User) -> Result<User, DomainError> {
        let inserted: Option<UserRow> = sqlx::query_as(&format!(
            r#"
            INSERT INTO users (id, email, password_hash, role, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (email) DO NOTHING
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(user.id.as_uuid())
        .bind(user.email.as_str())
        .bind(password_hash(&user.credential))
        .bind(user.role.as_str())
        .bind(user.created_at.as_datetime())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_error("insert user"))?;

        if let Some(row) = inserted {
            return User::try_from(row);
        }

        // Lost the race on the email; return the winner.
        self.find_user_by_email(&user.email).await?.ok_or_else(|| {
            DomainError::new(ErrorCode::UserNotFound, "user missing after email conflict")
        })
    }

    async fn find_user_by_customer_id(
        &mut self,
        provider: &str,
        customer_id: &str,
    ) -> Result<Option<UserId>, DomainError> {
        let user_id: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT user_id FROM subscriptions
            WHERE provider = $1 AND provider_customer_id = $2
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(provider)
        .bind(customer_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_error("find user by customer id"))?;

        if let Some(user_id) = user_id {
            return Ok(Some(UserId::from_uuid(user_id)));
        }

        let bound: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT user_id FROM customer_bindings
            WHERE provider = $1 AND provider_customer_id = $2
            "#,
        )
        .bind(provider)
        .bind(customer_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_error("find customer binding"))?;

        Ok(bound.map(UserId::from_uuid))
    }

    async fn bind_customer(
        &mut self,
        provider: &str,
        customer_id: &str,
        user_id: &UserId,
    ) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO customer_bindings (provider, provider_customer_id, user_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (provider, provider_customer_id) DO NOTHING
            "#,
        )
        .bind(provider)
        .bind(customer_id)
        .bind(user_id.as_uuid())
        .execute(&mut *self.tx)
        .await
        .map_err(db_error("bind customer"))?;

        Ok(())
    }

    async fn lock_subscription(
        &mut self,
        key: &SubscriptionKey,
    ) -> Result<Option<Subscription>, DomainError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM subscriptions
            WHERE provider = $1 AND provider_subscription_id = $2
            FOR UPDATE
            "#,
            SUBSCRIPTION_COLUMNS
        ))
        .bind(&key.provider)
        .bind(&key.provider_subscription_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_error("lock subscription"))?;

        row.map(Subscription::try_from).transpose()
    }

    async fn insert_subscription(
        &mut self,
        subscription: &Subscription,
    ) -> Result<InsertResult, DomainError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            r#"
            INSERT INTO subscriptions (
                id, user_id, provider, provider_subscription_id, provider_customer_id,
                plan, status, current_period_end, last_event_id, last_event_created_at,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (provider, provider_subscription_id) DO NOTHING
            RETURNING {}
            "#,
            SUBSCRIPTION_COLUMNS
        ))
        .bind(subscription.id.as_uuid())
        .bind(subscription.user_id.as_uuid())
        .bind(&subscription.key.provider)
        .bind(&subscription.key.provider_subscription_id)
        .bind(subscription.provider_customer_id.as_deref())
        .bind(subscription.plan.as_str())
        .bind(subscription.status.as_str())
        .bind(subscription.current_period_end.as_ref().map(Timestamp::as_datetime))
        .bind(subscription.last_event_id.as_deref())
        .bind(subscription.last_event_created_at.as_ref().map(Timestamp::as_datetime))
        .bind(subscription.created_at.as_datetime())
        .bind(subscription.updated_at.as_datetime())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_error("insert subscription"))?;

        match row {
            Some(row) => Ok(InsertResult::Inserted(Subscription::try_from(row)?)),
            None => Ok(InsertResult::Conflict),
        }
    }

    async fn update_subscription(&mut self, subscription: &Subscription) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions SET
                provider_customer_id = $3,
                plan = $4,
                status = $5,
                current_period_end = $6,
                last_event_id = $7,
                last_event_created_at = $8,
                updated_at = $9
            WHERE provider = $1 AND provider_subscription_id = $2
            "#,
        )
        .bind(&subscription.key.provider)
        .bind(&subscription.key.provider_subscription_id)
        .bind(subscription.provider_customer_id.as_deref())
        .bind(subscription.plan.as_str())
        .bind(subscription.status.as_str())
        .bind(subscription.current_period_end.as_ref().map(Timestamp::as_datetime))
        .bind(subscription.last_event_id.as_deref())
        .bind(subscription.last_event_created_at.as_ref().map(Timestamp::as_datetime))
        .bind(subscription.updated_at.as_datetime())
        .execute(&mut *self.tx)
        .await
        .map_err(db_error("update subscription"))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::SubscriptionNotFound,
                format!(
                    "subscription {} not found",
                    subscription.key.provider_subscription_id
                ),
            ));
        }

        Ok(())
    }

    async fn find_access_flag(&mut self, user_id: &UserId) -> Result<Option<AccessFlag>, DomainError> {
        // The user row lock serializes projections for the same user,
        // including the first one when no flag row exists yet.
        sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_error("lock user"))?;

        let row: Option<AccessFlagRow> = sqlx::query_as(
            "SELECT user_id, plan, is_active, updated_at FROM access_flags WHERE user_id = $1",
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_error("find access flag"))?;

        Ok(row.map(AccessFlag::from))
    }

    async fn save_access_flag(&mut self, flag: &AccessFlag) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO access_flags (user_id, plan, is_active, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE SET
                plan = EXCLUDED.plan,
                is_active = EXCLUDED.is_active,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(flag.user_id.as_uuid())
        .bind(flag.plan.as_str())
        .bind(flag.is_active)
        .bind(flag.updated_at.as_datetime())
        .execute(&mut *self.tx)
        .await
        .map_err(db_error("save access flag"))?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        let PostgresTx { tx } = *self;
        tx.commit().await.map_err(db_error("commit transaction"))
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Read side
// ════════════════════════════════════════════════════════════════════════════

#[async_trait]
impl AccessFlagReader for PostgresReconciliationStore {
    async fn get_access_flag(&self, user_id: &UserId) -> Result<AccessFlagView, DomainError> {
        let row: Option<AccessFlagRow> = sqlx::query_as(
            "SELECT user_id, plan, is_active, updated_at FROM access_flags WHERE user_id = $1",
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("read access flag"))?;

        Ok(row
            .map(|row| AccessFlag::from(row).view())
            .unwrap_or_else(AccessFlagView::inactive))
    }
}

#[async_trait]
impl UserDirectory for PostgresReconciliationStore {
    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<User>, DomainError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS))
                .bind(email.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error("find user by email"))?;

        row.map(User::try_from).transpose()
    }
}

#[async_trait]
impl StoreHealth for PostgresReconciliationStore {
    async fn ping(&self) -> Result<(), DomainError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(db_error("ping database"))?;
        Ok(())
    }
}
