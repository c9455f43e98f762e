//! Plan labels and the price-to-plan catalog.

use std::collections::HashMap;
use std::fmt;

/// Plan label carried by a subscription or access flag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Plan {
    /// A known plan name such as "pro" or "enterprise".
    Named(String),
    /// The event did not say which plan it was for.
    Unknown,
}

impl Plan {
    /// Builds a plan from a raw label.
    ///
    /// Blank input and the literal "unknown" become `Plan::Unknown`.
    pub fn from_label(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("unknown") {
            Plan::Unknown
        } else {
            Plan::Named(trimmed.to_string())
        }
    }

    /// Returns the label if the plan is known.
    pub fn name(&self) -> Option<&str> {
        match self {
            Plan::Named(name) => Some(name.as_str()),
            Plan::Unknown => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Plan::Named(_))
    }

    /// Label used for persistence.
    pub fn as_str(&self) -> &str {
        match self {
            Plan::Named(name) => name.as_str(),
            Plan::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps provider price identifiers to plan labels.
///
/// Also carries the plan granted by the checkout fast path when the
/// checkout session names none.
#[derive(Debug, Clone)]
pub struct PlanCatalog {
    by_price: HashMap<String, String>,
    default_plan: String,
}

impl PlanCatalog {
    pub fn new(default_plan: impl Into<String>) -> Self {
        Self {
            by_price: HashMap::new(),
            default_plan: default_plan.into(),
        }
    }

    /// Adds a price mapping.
    pub fn with_price(mut self, price_id: impl Into<String>, plan: impl Into<String>) -> Self {
        self.by_price.insert(price_id.into(), plan.into());
        self
    }

    /// Parses a `price_a=pro,price_b=enterprise` mapping string.
    ///
    /// Malformed or blank pairs are skipped.
    pub fn from_mapping(default_plan: impl Into<String>, mapping: &str) -> Self {
        let by_price = mapping
            .split(',')
            .filter_map(|pair| {
                let (price, plan) = pair.split_once('=')?;
                let (price, plan) = (price.trim(), plan.trim());
                if price.is_empty() || plan.is_empty() {
                    return None;
                }
                Some((price.to_string(), plan.to_string()))
            })
            .collect();

        Self {
            by_price,
            default_plan: default_plan.into(),
        }
    }

    /// Looks up the plan for a price id.
    pub fn plan_for_price(&self, price_id: &str) -> Option<Plan> {
        self.by_price.get(price_id).map(|plan| Plan::from_label(plan))
    }

    /// Plan granted by a checkout that names none.
    pub fn default_plan(&self) -> Plan {
        Plan::from_label(&self.default_plan)
    }

    pub fn len(&self) -> usize {
        self.by_price.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_price.is_empty()
    }
}

impl Default for PlanCatalog {
    fn default() -> Self {
        Self::new("pro")
    }
}
