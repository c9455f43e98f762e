//! Canonical subscription status.
//!
//! Provider status strings are normalized into a closed set so the
//! entitlement rule ("active or trialing grants access") has exactly one
//! place to look.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized subscription status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Canceled,
    Incomplete,
    Unknown,
}

impl SubscriptionStatus {
    /// Normalizes a provider status string.
    ///
    /// Matching is case-insensitive. `unpaid` collapses into `PastDue` and
    /// `incomplete_expired` into `Canceled`. Anything unrecognized, including
    /// `paused`, becomes `Unknown`, which never grants access.
    pub fn from_provider(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "active" => Self::Active,
            "trialing" => Self::Trialing,
            "past_due" | "unpaid" => Self::PastDue,
            "canceled" | "cancelled" | "incomplete_expired" => Self::Canceled,
            "incomplete" => Self::Incomplete,
            _ => Self::Unknown,
        }
    }

    /// Parses a stored status label. Only canonical labels are accepted.
    pub fn parse_stored(raw: &str) -> Option<Self> {
        match raw {
            "active" => Some(Self::Active),
            "trialing" => Some(Self::Trialing),
            "past_due" => Some(Self::PastDue),
            "canceled" => Some(Self::Canceled),
            "incomplete" => Some(Self::Incomplete),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }

    /// Returns true if this status entitles the user to paid features.
    pub fn grants_access(&self) -> bool {
        matches!(self, Self::Active | Self::Trialing)
    }

    /// Returns the canonical lowercase label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Trialing => "trialing",
            Self::PastDue => "past_due",
            Self::Canceled => "canceled",
            Self::Incomplete => "incomplete",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
