//! Stripe webhook signature verification.
//!
//! The provider signs `"{t}.{raw body}"` with HMAC-SHA256 and sends
//! `t=<unix>,v1=<hex>[,v1=<hex>...]` in the `Stripe-Signature` header.
//! During secret rotation several `v1` entries arrive; any match is enough.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::provider_event::WebhookEvent;
use super::webhook_errors::WebhookError;

/// Default maximum age of a signed timestamp.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Maximum allowed clock skew for timestamps from the future.
const MAX_CLOCK_SKEW_SECS: i64 = 60;

type HmacSha256 = Hmac<Sha256>;

/// Parsed components of the Stripe-Signature header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    /// Unix timestamp when the signature was generated.
    pub timestamp: i64,
    /// Every v1 signature present, decoded from hex.
    pub v1_signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    /// Parses a Stripe-Signature header string.
    ///
    /// Unknown schemes (`v0`, future versions) are ignored. A `v1` entry
    /// that is not valid hex is skipped rather than failing the whole header.
    ///
    /// # Errors
    ///
    /// `SignatureInvalid` if the timestamp or every usable `v1` is missing.
    pub fn parse(header: &str) -> Result<Self, WebhookError> {
        let mut timestamp: Option<i64> = None;
        let mut v1_signatures = Vec::new();

        for part in header.split(',') {
            let Some((key, value)) = part.trim().split_once('=') else {
                continue;
            };

            match key {
                "t" => {
                    timestamp = Some(value.parse().map_err(|_| {
                        WebhookError::SignatureInvalid("invalid timestamp".to_string())
                    })?);
                }
                "v1" => {
                    if let Ok(signature) = hex::decode(value) {
                        v1_signatures.push(signature);
                    }
                }
                _ => {}
            }
        }

        let timestamp = timestamp
            .ok_or_else(|| WebhookError::SignatureInvalid("missing timestamp".to_string()))?;

        if v1_signatures.is_empty() {
            return Err(WebhookError::SignatureInvalid("missing v1 signature".to_string()));
        }

        Ok(Self {
            timestamp,
            v1_signatures,
        })
    }
}

/// Verifier for provider webhook signatures.
pub struct WebhookVerifier {
    secret: Option<SecretString>,
    tolerance_secs: i64,
}

impl WebhookVerifier {
    /// Creates a verifier. A missing or blank secret makes every
    /// verification fail with `SecretNotConfigured`.
    pub fn new(secret: Option<SecretString>, tolerance_secs: i64) -> Self {
        Self {
            secret,
            tolerance_secs,
        }
    }

    /// Verifies the signature against the current clock and parses the event.
    pub fn verify(
        &self,
        payload: &[u8],
        signature_header: Option<&str>,
    ) -> Result<WebhookEvent, WebhookError> {
        self.verify_at(payload, signature_header, chrono::Utc::now().timestamp())
    }

    /// Verifies the signature as of `now` (Unix seconds) and parses the event.
    ///
    /// # Errors
    ///
    /// - `SecretNotConfigured` - no secret; checked before anything else
    /// - `SignatureInvalid` - header missing, malformed, or no match
    /// - `TimestampOutOfRange` - signed too long ago or too far ahead
    /// - `MalformedPayload` - authentic body that is not an event
    pub fn verify_at(
        &self,
        payload: &[u8],
        signature_header: Option<&str>,
        now: i64,
    ) -> Result<WebhookEvent, WebhookError> {
        let secret = self
            .secret
            .as_ref()
            .map(|s| s.expose_secret().as_str())
            .filter(|s| !s.trim().is_empty())
            .ok_or(WebhookError::SecretNotConfigured)?;

        let header = signature_header
            .filter(|h| !h.trim().is_empty())
            .ok_or_else(|| WebhookError::SignatureInvalid("missing signature header".to_string()))?;
        let header = SignatureHeader::parse(header)?;

        self.validate_timestamp(header.timestamp, now)?;

        let expected = compute_signature(secret, header.timestamp, payload)?;
        let matched = header
            .v1_signatures
            .iter()
            .any(|candidate| constant_time_compare(&expected, candidate));

        if !matched {
            return Err(WebhookError::SignatureInvalid("signature mismatch".to_string()));
        }

        WebhookEvent::from_slice(payload)
    }

    fn validate_timestamp(&self, timestamp: i64, now: i64) -> Result<(), WebhookError> {
        let age = now.saturating_sub(timestamp);

        if age > self.tolerance_secs || age < -MAX_CLOCK_SKEW_SECS {
            return Err(WebhookError::TimestampOutOfRange);
        }

        Ok(())
    }
}

fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> Result<Vec<u8>, WebhookError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| WebhookError::SecretNotConfigured)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Constant-time comparison of two byte slices.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Computes the hex `v1` signature a provider would send.
///
/// Used by tests and local tooling to sign fixture payloads.
pub fn compute_signature_hex(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "whsec_test_secret_12345";
    const NOW: i64 = 1_704_067_200;

    fn verifier() -> WebhookVerifier {
        WebhookVerifier::new(
            Some(SecretString::new(TEST_SECRET.to_string())),
            DEFAULT_TOLERANCE_SECS,
        )
    }

    fn payload() -> Vec<u8> {
        br#"{"id":"evt_1","type":"customer.subscription.updated","created":1704067200,"data":{"object":{"id":"sub_1"}}}"#.to_vec()
    }

    fn signed_header(timestamp: i64, body: &[u8]) -> String {
        format!("t={},v1={}", timestamp, compute_signature_hex(TEST_SECRET, timestamp, body))
    }

    // ══════════════════════════════════════════════════════════════
    // SignatureHeader Parsing Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn parse_header_collects_every_v1() {
        let header = format!("t=1234567890,v1={},v1={},v0={}", "a".repeat(64), "b".repeat(64), "c".repeat(64));

        let parsed = SignatureHeader::parse(&header).unwrap();

        assert_eq!(parsed.timestamp, 1234567890);
        assert_eq!(parsed.v1_signatures.len(), 2);
        assert_eq!(parsed.v1_signatures[0].len(), 32);
    }

    #[test]
    fn parse_header_missing_timestamp_fails() {
        let header = format!("v1={}", "a".repeat(64));
        assert!(matches!(
            SignatureHeader::parse(&header),
            Err(WebhookError::SignatureInvalid(_))
        ));
    }

    #[test]
    fn parse_header_missing_v1_fails() {
        assert!(matches!(
            SignatureHeader::parse("t=1234567890,v0=abcd"),
            Err(WebhookError::SignatureInvalid(_))
        ));
    }

    #[test]
    fn parse_header_non_numeric_timestamp_fails() {
        let header = format!("t=soon,v1={}", "a".repeat(64));
        assert!(SignatureHeader::parse(&header).is_err());
    }

    #[test]
    fn parse_header_skips_bad_hex() {
        let header = format!("t=1,v1=zz,v1={}", "a".repeat(64));
        let parsed = SignatureHeader::parse(&header).unwrap();
        assert_eq!(parsed.v1_signatures.len(), 1);
    }

    // ══════════════════════════════════════════════════════════════
    // Verification Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn valid_signature_parses_event() {
        let body = payload();
        let event = verifier()
            .verify_at(&body, Some(&signed_header(NOW, &body)), NOW)
            .unwrap();

        assert_eq!(event.id, "evt_1");
    }

    #[test]
    fn any_matching_v1_is_accepted() {
        let body = payload();
        let header = format!(
            "t={},v1={},v1={}",
            NOW,
            "0".repeat(64),
            compute_signature_hex(TEST_SECRET, NOW, &body)
        );

        assert!(verifier().verify_at(&body, Some(&header), NOW).is_ok());
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let body = payload();
        let header = signed_header(NOW, &body);
        let mut tampered = body.clone();
        tampered.extend_from_slice(b" ");

        assert!(matches!(
            verifier().verify_at(&tampered, Some(&header), NOW),
            Err(WebhookError::SignatureInvalid(_))
        ));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let body = payload();
        let header = format!("t={},v1={}", NOW, compute_signature_hex("whsec_other", NOW, &body));

        assert!(matches!(
            verifier().verify_at(&body, Some(&header), NOW),
            Err(WebhookError::SignatureInvalid(_))
        ));
    }

    #[test]
    fn missing_header_is_rejected() {
        assert!(matches!(
            verifier().verify_at(&payload(), None, NOW),
            Err(WebhookError::SignatureInvalid(_))
        ));
    }

    #[test]
    fn missing_secret_is_reported_first() {
        let unconfigured = WebhookVerifier::new(None, DEFAULT_TOLERANCE_SECS);
        let blank = WebhookVerifier::new(Some(SecretString::new("  ".to_string())), DEFAULT_TOLERANCE_SECS);

        assert!(matches!(
            unconfigured.verify_at(&payload(), None, NOW),
            Err(WebhookError::SecretNotConfigured)
        ));
        assert!(matches!(
            blank.verify_at(&payload(), Some("t=1,v1=00"), NOW),
            Err(WebhookError::SecretNotConfigured)
        ));
    }

    #[test]
    fn old_timestamp_is_rejected() {
        let body = payload();
        let signed_at = NOW - DEFAULT_TOLERANCE_SECS - 1;

        assert!(matches!(
            verifier().verify_at(&body, Some(&signed_header(signed_at, &body)), NOW),
            Err(WebhookError::TimestampOutOfRange)
        ));
    }

    #[test]
    fn timestamp_at_tolerance_edge_is_accepted() {
        let body = payload();
        let signed_at = NOW - DEFAULT_TOLERANCE_SECS;

        assert!(verifier()
            .verify_at(&body, Some(&signed_header(signed_at, &body)), NOW)
            .is_ok());
    }

    #[test]
    fn future_timestamp_beyond_skew_is_rejected() {
        let body = payload();
        let signed_at = NOW + MAX_CLOCK_SKEW_SECS + 1;

        assert!(matches!(
            verifier().verify_at(&body, Some(&signed_header(signed_at, &body)), NOW),
            Err(WebhookError::TimestampOutOfRange)
        ));
    }

    #[test]
    fn authentic_garbage_is_malformed() {
        let body = b"not json".to_vec();

        assert!(matches!(
            verifier().verify_at(&body, Some(&signed_header(NOW, &body)), NOW),
            Err(WebhookError::MalformedPayload(_))
        ));
    }

    #[test]
    fn constant_time_compare_rejects_length_mismatch() {
        assert!(!constant_time_compare(&[1, 2, 3], &[1, 2]));
        assert!(constant_time_compare(&[1, 2, 3], &[1, 2, 3]));
    }
}
