//! Provider webhook events and the snapshots reconciliation reads from them.
//!
//! Only fields relevant to reconciliation are captured. The `data.object`
//! payload stays untyped until a snapshot is taken, because its shape
//! depends on the event type.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::foundation::Timestamp;

use super::plan::{Plan, PlanCatalog};
use super::status::SubscriptionStatus;
use super::user::EmailAddress;
use super::webhook_errors::WebhookError;

/// Verified provider event.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookEvent {
    /// Unique identifier (evt_xxx), used as the idempotency token.
    pub id: String,

    #[serde(rename = "type")]
    pub event_type: String,

    /// Creation time in Unix seconds.
    pub created: i64,

    pub data: EventData,

    #[serde(default)]
    pub livemode: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventData {
    /// The object that triggered the event.
    pub object: serde_json::Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_attributes: Option<serde_json::Value>,
}

impl WebhookEvent {
    /// Parses a verified payload.
    ///
    /// # Errors
    ///
    /// `MalformedPayload` when the JSON is invalid or lacks required fields.
    pub fn from_slice(payload: &[u8]) -> Result<Self, WebhookError> {
        serde_json::from_slice(payload).map_err(|e| WebhookError::MalformedPayload(e.to_string()))
    }

    /// Creation time as a timestamp.
    pub fn created_at(&self) -> Result<Timestamp, WebhookError> {
        Timestamp::from_unix_secs(self.created).ok_or_else(|| {
            WebhookError::MalformedPayload(format!("created out of range: {}", self.created))
        })
    }

    /// Attempts to deserialize the data object as `T`.
    pub fn deserialize_object<T: serde::de::DeserializeOwned>(&self) -> Result<T, WebhookError> {
        T::deserialize(&self.data.object).map_err(|e| WebhookError::MalformedPayload(e.to_string()))
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Provider object shapes
// ════════════════════════════════════════════════════════════════════════════

/// Reference that may arrive as a bare id or as an expanded object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ObjectRef {
    Id(String),
    Expanded { id: String },
}

impl ObjectRef {
    fn into_id(self) -> String {
        match self {
            ObjectRef::Id(id) | ObjectRef::Expanded { id } => id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SubscriptionObject {
    id: String,
    #[serde(default)]
    customer: Option<ObjectRef>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    current_period_end: Option<i64>,
    #[serde(default)]
    metadata: Option<HashMap<String, String>>,
    #[serde(default)]
    customer_email: Option<String>,
    #[serde(default)]
    items: Option<ItemList>,
}

#[derive(Debug, Deserialize)]
struct ItemList {
    #[serde(default)]
    data: Vec<SubscriptionItem>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionItem {
    #[serde(default)]
    price: Option<Price>,
    #[serde(default)]
    current_period_end: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Price {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    nickname: Option<String>,
    #[serde(default)]
    lookup_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CheckoutSessionObject {
    #[serde(default)]
    customer: Option<ObjectRef>,
    #[serde(default)]
    subscription: Option<ObjectRef>,
    #[serde(default)]
    customer_details: Option<CustomerDetails>,
    #[serde(default)]
    customer_email: Option<String>,
    #[serde(default)]
    metadata: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct CustomerDetails {
    #[serde(default)]
    email: Option<String>,
}

/// First candidate that parses as an email address.
fn first_email<'a>(candidates: impl IntoIterator<Item = Option<&'a str>>) -> Option<EmailAddress> {
    candidates
        .into_iter()
        .flatten()
        .find_map(|raw| EmailAddress::parse(raw).ok())
}

/// Metadata key the checkout flow tags sessions and subscriptions with.
const APP_USER_EMAIL_KEY: &str = "app_user_email";

fn metadata_value<'a>(metadata: &'a Option<HashMap<String, String>>, key: &str) -> Option<&'a str> {
    metadata.as_ref()?.get(key).map(String::as_str)
}

// ════════════════════════════════════════════════════════════════════════════
// Snapshots
// ════════════════════════════════════════════════════════════════════════════

/// What a subscription lifecycle event says about the subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionSnapshot {
    pub provider_subscription_id: String,
    pub provider_customer_id: Option<String>,
    pub email: Option<EmailAddress>,
    pub status: SubscriptionStatus,
    pub plan: Plan,
    pub current_period_end: Option<Timestamp>,
}

impl SubscriptionSnapshot {
    /// Extracts the snapshot from a lifecycle event.
    ///
    /// Email comes from `metadata.app_user_email`, `metadata.email`, then
    /// `customer_email`. Plan comes from `metadata.plan`, then the first
    /// item's price mapped through the catalog, then the price nickname, then
    /// the price lookup key.
    pub fn from_event(event: &WebhookEvent, catalog: &PlanCatalog) -> Result<Self, WebhookError> {
        let object: SubscriptionObject = event.deserialize_object()?;

        if object.id.trim().is_empty() {
            return Err(WebhookError::MalformedPayload("subscription id is empty".to_string()));
        }

        let email = first_email([
            metadata_value(&object.metadata, APP_USER_EMAIL_KEY),
            metadata_value(&object.metadata, "email"),
            object.customer_email.as_deref(),
        ]);

        let first_item = object.items.as_ref().and_then(|items| items.data.first());
        let plan = Self::derive_plan(&object, first_item, catalog);

        let period_end = object
            .current_period_end
            .or_else(|| first_item.and_then(|item| item.current_period_end))
            .and_then(Timestamp::from_unix_secs);

        let status = object
            .status
            .as_deref()
            .map(SubscriptionStatus::from_provider)
            .unwrap_or(SubscriptionStatus::Unknown);

        Ok(Self {
            provider_subscription_id: object.id,
            provider_customer_id: object.customer.map(ObjectRef::into_id),
            email,
            status,
            plan,
            current_period_end: period_end,
        })
    }

    fn derive_plan(
        object: &SubscriptionObject,
        first_item: Option<&SubscriptionItem>,
        catalog: &PlanCatalog,
    ) -> Plan {
        if let Some(plan) = metadata_value(&object.metadata, "plan").map(Plan::from_label) {
            if plan.is_known() {
                return plan;
            }
        }

        let price = first_item.and_then(|item| item.price.as_ref());

        price
            .and_then(|p| p.id.as_deref())
            .and_then(|id| catalog.plan_for_price(id))
            .filter(Plan::is_known)
            .or_else(|| {
                [
                    price.and_then(|p| p.nickname.as_deref()),
                    price.and_then(|p| p.lookup_key.as_deref()),
                ]
                .into_iter()
                .flatten()
                .map(Plan::from_label)
                .find(Plan::is_known)
            })
            .unwrap_or(Plan::Unknown)
    }
}

/// What a completed checkout session says about the buyer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSnapshot {
    pub provider_customer_id: Option<String>,
    pub provider_subscription_id: Option<String>,
    pub email: Option<EmailAddress>,
    pub plan: Plan,
}

impl CheckoutSnapshot {
    /// Extracts the snapshot from a `checkout.session.completed` event.
    ///
    /// Email comes from `customer_details.email`, `customer_email`, then
    /// `metadata.app_user_email` or `metadata.email`. Plan is `metadata.plan` or the catalog default.
    pub fn from_event(event: &WebhookEvent, catalog: &PlanCatalog) -> Result<Self, WebhookError> {
        let object: CheckoutSessionObject = event.deserialize_object()?;

        let email = first_email([
            object
                .customer_details
                .as_ref()
                .and_then(|details| details.email.as_deref()),
            object.customer_email.as_deref(),
            metadata_value(&object.metadata, APP_USER_EMAIL_KEY),
            metadata_value(&object.metadata, "email"),
        ]);

        let plan = metadata_value(&object.metadata, "plan")
            .map(Plan::from_label)
            .filter(Plan::is_known)
            .unwrap_or_else(|| catalog.default_plan());

        Ok(Self {
            provider_customer_id: object.customer.map(ObjectRef::into_id),
            provider_subscription_id: object.subscription.map(ObjectRef::into_id),
            email,
            plan,
        })
    }
}

/// Builder for creating test WebhookEvent instances.
#[cfg(test)]
pub(crate) struct WebhookEventBuilder {
    id: String,
    event_type: String,
    created: i64,
    object: serde_json::Value,
}

#[cfg(test)]
impl WebhookEventBuilder {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            id: "evt_test_123".to_string(),
            event_type: event_type.into(),
            created: 1_704_067_200,
            object: serde_json::json!({}),
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn created(mut self, created: i64) -> Self {
        self.created = created;
        self
    }

    pub fn object(mut self, object: serde_json::Value) -> Self {
        self.object = object;
        self
    }

    pub fn build(self) -> WebhookEvent {
        WebhookEvent {
            id: self.id,
            event_type: self.event_type,
            created: self.created,
            data: EventData {
                object: self.object,
                previous_attributes: None,
            },
            livemode: false,
            api_version: Some("2023-10-16".to_string()),
        }
    }
}
