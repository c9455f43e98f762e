//! Webhook response bodies.

use serde::Serialize;

use crate::application::ReconcileOutcome;

/// Body returned for every acknowledged delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookAck {
    pub ok: bool,
    pub outcome: &'static str,
}

impl From<&ReconcileOutcome> for WebhookAck {
    fn from(outcome: &ReconcileOutcome) -> Self {
        Self {
            ok: true,
            outcome: outcome.label(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ack_serializes_outcome_label() {
        let outcome = ReconcileOutcome::Deferred {
            event_id: "evt_1".to_string(),
        };

        let json = serde_json::to_value(WebhookAck::from(&outcome)).unwrap();

        assert_eq!(json, serde_json::json!({"ok": true, "outcome": "deferred"}));
    }
}
