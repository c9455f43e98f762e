//! ReconcileWebhookHandler - Command handler for provider webhook deliveries.
//!
//! A delivery moves through verify, classify, resolve, apply and project,
//! then commits once. Every store call after `begin` belongs to the same
//! transaction; an error drops it uncommitted.

use std::sync::Arc;

use serde::Serialize;

use crate::domain::billing::{
    classify, CheckoutSnapshot, EventKind, LedgerOutcome, PlanCatalog, SubscriptionChange,
    SubscriptionKey, SubscriptionSnapshot, SubscriptionStatus, WebhookError, WebhookEvent,
    WebhookVerifier, STRIPE_PROVIDER,
};
use crate::domain::foundation::UserId;
use crate::ports::ReconciliationStore;

use super::entitlement_projector::EntitlementProjector;
use super::identity_resolver::IdentityResolver;
use super::subscription_ledger::SubscriptionLedger;

/// Command to reconcile one webhook delivery.
#[derive(Debug, Clone)]
pub struct ReconcileWebhookCommand {
    /// Raw request body, exactly as signed.
    pub payload: Vec<u8>,
    /// Value of the `Stripe-Signature` header, if sent.
    pub signature: Option<String>,
}

/// Terminal-success outcome of a delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// Ledger written and access flag projected.
    SubscriptionApplied {
        event_id: String,
        user_id: UserId,
        status: SubscriptionStatus,
        is_active: bool,
    },
    /// Checkout fast path activated the user.
    CheckoutActivated { event_id: String, user_id: UserId },
    /// Event already applied.
    Deduplicated { event_id: String },
    /// A newer event was already applied, or the checkout was superseded.
    Stale { event_id: String },
    /// No user could be resolved; left for follow-up.
    Deferred { event_id: String },
    /// Event type not reconciled.
    Ignored { event_type: String },
    /// Authentic event that could not be parsed; redelivery cannot help.
    Discarded { reason: String },
}

impl ReconcileOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ReconcileOutcome::SubscriptionApplied { .. } => "subscription_applied",
            ReconcileOutcome::CheckoutActivated { .. } => "checkout_activated",
            ReconcileOutcome::Deduplicated { .. } => "deduplicated",
            ReconcileOutcome::Stale { .. } => "stale",
            ReconcileOutcome::Deferred { .. } => "deferred",
            ReconcileOutcome::Ignored { .. } => "ignored",
            ReconcileOutcome::Discarded { .. } => "discarded",
        }
    }
}

/// Handler wiring verifier, resolver, ledger and projector.
pub struct ReconcileWebhookHandler {
    verifier: Arc<WebhookVerifier>,
    store: Arc<dyn ReconciliationStore>,
    catalog: Arc<PlanCatalog>,
    resolver: IdentityResolver,
    ledger: SubscriptionLedger,
    projector: EntitlementProjector,
}

impl ReconcileWebhookHandler {
    pub fn new(
        verifier: Arc<WebhookVerifier>,
        store: Arc<dyn ReconciliationStore>,
        catalog: Arc<PlanCatalog>,
    ) -> Self {
        Self {
            verifier,
            store,
            catalog,
            resolver: IdentityResolver,
            ledger: SubscriptionLedger,
            projector: EntitlementProjector,
        }
    }

    /// Verifies and reconciles a delivery.
    ///
    /// Acknowledged conditions (duplicate, unresolved identity, ignored type,
    /// authentic but unparseable payload) come back as `Ok`; only failures
    /// the provider should see are `Err`.
    pub async fn handle(&self, cmd: ReconcileWebhookCommand) -> Result<ReconcileOutcome, WebhookError> {
        // The signature is checked before parsing, so a malformed payload here is authentic.
        let event = match self.verifier.verify(&cmd.payload, cmd.signature.as_deref()) {
            Ok(event) => event,
            Err(err @ WebhookError::MalformedPayload(_)) => return absorb(err),
            Err(err) => {
                tracing::warn!(error = %err, "rejected webhook delivery");
                return Err(err);
            }
        };

        self.reconcile(&event).await.or_else(absorb)
    }

    /// Reconciles an already verified event.
    pub async fn reconcile(&self, event: &WebhookEvent) -> Result<ReconcileOutcome, WebhookError> {
        match classify(&event.event_type) {
            EventKind::Lifecycle => self.reconcile_lifecycle(event).await,
            EventKind::CheckoutCompleted => self.reconcile_checkout(event).await,
            EventKind::Ignored => Err(WebhookError::UnknownEventType(event.event_type.clone())),
        }
    }

    async fn reconcile_lifecycle(&self, event: &WebhookEvent) -> Result<ReconcileOutcome, WebhookError> {
        let snapshot = SubscriptionSnapshot::from_event(event, &self.catalog)?;
        let event_created_at = event.created_at()?;

        let mut tx = self.store.begin().await?;

        let resolved = self
            .resolver
            .resolve(
                tx.as_mut(),
                snapshot.email.as_ref(),
                snapshot.provider_customer_id.as_deref(),
            )
            .await?;

        let Some(user_id) = resolved else {
            tx.commit().await?;
            tracing::warn!(
                event_id = %event.id,
                subscription = %snapshot.provider_subscription_id,
                "no user for subscription event, deferring"
            );
            return Err(WebhookError::IdentityUnresolved(event.id.clone()));
        };

        let change = SubscriptionChange {
            event_id: event.id.clone(),
            event_created_at,
            key: SubscriptionKey::stripe(snapshot.provider_subscription_id),
            provider_customer_id: snapshot.provider_customer_id,
            user_id,
            status: snapshot.status,
            plan: snapshot.plan,
            current_period_end: snapshot.current_period_end,
        };

        let outcome = self.ledger.apply(tx.as_mut(), &change).await?;

        match outcome {
            LedgerOutcome::Created(row) | LedgerOutcome::Updated(row) => {
                let flag = self
                    .projector
                    .project(tx.as_mut(), row.user_id, row.status, &row.plan)
                    .await?;
                tx.commit().await?;

                tracing::info!(
                    event_id = %event.id,
                    user_id = %row.user_id,
                    status = %row.status,
                    plan = %flag.plan,
                    is_active = flag.is_active,
                    "subscription reconciled"
                );

                Ok(ReconcileOutcome::SubscriptionApplied {
                    event_id: event.id.clone(),
                    user_id: row.user_id,
                    status: row.status,
                    is_active: flag.is_active,
                })
            }
            LedgerOutcome::Deduplicated(_) => {
                tx.commit().await?;
                Err(WebhookError::DuplicateEvent(event.id.clone()))
            }
            LedgerOutcome::Stale(row) => {
                tx.commit().await?;
                tracing::info!(
                    event_id = %event.id,
                    applied = row.last_event_id.as_deref().unwrap_or_default(),
                    "older event arrived after a newer one, skipping"
                );
                Ok(ReconcileOutcome::Stale {
                    event_id: event.id.clone(),
                })
            }
        }
    }

    async fn reconcile_checkout(&self, event: &WebhookEvent) -> Result<ReconcileOutcome, WebhookError> {
        let snapshot = CheckoutSnapshot::from_event(event, &self.catalog)?;

        let mut tx = self.store.begin().await?;

        let resolved = self
            .resolver
            .resolve(
                tx.as_mut(),
                snapshot.email.as_ref(),
                snapshot.provider_customer_id.as_deref(),
            )
            .await?;

        let Some(user_id) = resolved else {
            tx.commit().await?;
            tracing::warn!(event_id = %event.id, "no user for checkout, deferring");
            return Err(WebhookError::IdentityUnresolved(event.id.clone()));
        };

        // Lifecycle events rarely carry an email; the customer id ties them back.
        if let Some(customer_id) = &snapshot.provider_customer_id {
            tx.bind_customer(STRIPE_PROVIDER, customer_id, &user_id).await?;
        }

        // Once the subscription is in the ledger, the lifecycle events own the flag.
        if let Some(subscription_id) = &snapshot.provider_subscription_id {
            let key = SubscriptionKey::stripe(subscription_id.clone());
            if tx.lock_subscription(&key).await?.is_some() {
                tx.commit().await?;
                tracing::debug!(event_id = %event.id, "checkout superseded by ledger");
                return Ok(ReconcileOutcome::Stale {
                    event_id: event.id.clone(),
                });
            }
        }

        let flag = self
            .projector
            .activate_on_checkout(tx.as_mut(), user_id, &snapshot.plan)
            .await?;
        tx.commit().await?;

        tracing::info!(
            event_id = %event.id,
            user_id = %user_id,
            plan = %flag.plan,
            "checkout activated access"
        );

        Ok(ReconcileOutcome::CheckoutActivated {
            event_id: event.id.clone(),
            user_id,
        })
    }
}

/// Turns acknowledged conditions into outcomes.
fn absorb(err: WebhookError) -> Result<ReconcileOutcome, WebhookError> {
    match err {
        WebhookError::DuplicateEvent(event_id) => {
            tracing::debug!(%event_id, "duplicate delivery");
            Ok(ReconcileOutcome::Deduplicated { event_id })
        }
        WebhookError::IdentityUnresolved(event_id) => Ok(ReconcileOutcome::Deferred { event_id }),
        WebhookError::UnknownEventType(event_type) => {
            tracing::debug!(%event_type, "ignoring event type");
            Ok(ReconcileOutcome::Ignored { event_type })
        }
        WebhookError::MalformedPayload(reason) => {
            tracing::error!(%reason, "authentic event could not be parsed, acknowledging");
            Ok(ReconcileOutcome::Discarded { reason })
        }
        other => {
            if other.is_retryable() {
                tracing::error!(error = %other, "reconciliation failed, provider will retry");
            } else {
                tracing::warn!(error = %other, "reconciliation rejected event");
            }
            Err(other)
        }
    }
}
