//! Payment configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::domain::billing::{PlanCatalog, WebhookVerifier, DEFAULT_TOLERANCE_SECS};

use super::error::ValidationError;

/// Payment configuration (Stripe webhooks)
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Stripe webhook signing secret.
    ///
    /// Optional at load time; deliveries are refused until it is set.
    pub stripe_webhook_secret: Option<SecretString>,

    /// Maximum age of a signed timestamp, in seconds
    #[serde(default = "default_signature_tolerance")]
    pub signature_tolerance_secs: i64,

    /// Plan granted by a checkout that names none
    #[serde(default = "default_plan")]
    pub default_plan: String,

    /// Price id to plan mapping, e.g. `price_x=pro,price_y=enterprise`
    #[serde(default)]
    pub price_plans: String,
}

impl PaymentConfig {
    pub fn has_webhook_secret(&self) -> bool {
        self.stripe_webhook_secret
            .as_ref()
            .is_some_and(|s| !s.expose_secret().trim().is_empty())
    }

    pub fn plan_catalog(&self) -> PlanCatalog {
        PlanCatalog::from_mapping(self.default_plan.clone(), &self.price_plans)
    }

    pub fn webhook_verifier(&self) -> WebhookVerifier {
        WebhookVerifier::new(
            self.stripe_webhook_secret.clone(),
            self.signature_tolerance_secs,
        )
    }

    /// Validate payment configuration
    ///
    /// A missing secret is allowed here; the webhook reports it per request.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(secret) = &self.stripe_webhook_secret {
            let secret = secret.expose_secret();
            if !secret.trim().is_empty() && !secret.starts_with("whsec_") {
                return Err(ValidationError::InvalidStripeWebhookSecret);
            }
        }
        if !(1..=3600).contains(&self.signature_tolerance_secs) {
            return Err(ValidationError::InvalidSignatureTolerance);
        }
        if self.default_plan.trim().is_empty() {
            return Err(ValidationError::MissingRequired("PAYMENT__DEFAULT_PLAN"));
        }
        for pair in self.price_plans.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let valid = pair
                .split_once('=')
                .is_some_and(|(price, plan)| !price.trim().is_empty() && !plan.trim().is_empty());
            if !valid {
                return Err(ValidationError::InvalidPricePlans(pair.to_string()));
            }
        }
        Ok(())
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            stripe_webhook_secret: None,
            signature_tolerance_secs: default_signature_tolerance(),
            default_plan: default_plan(),
            price_plans: String::new(),
        }
    }
}

fn default_signature_tolerance() -> i64 {
    DEFAULT_TOLERANCE_SECS
}

fn default_plan() -> String {
    "pro".to_string()
}
