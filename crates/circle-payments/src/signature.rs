//! Webhook Signature Verification
//!
//! Stripe signs `"{timestamp}.{raw body}"` with HMAC-SHA256 keyed by the
//! endpoint secret and sends `t=<unix>,v1=<hex>[,v1=<hex>...]` in the
//! `Stripe-Signature` header. The MAC is computed over the exact bytes
//! received; re-serialized JSON would not match.

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{PaymentError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the signature
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Maximum age of a signed timestamp (seconds)
pub const TOLERANCE_SECS: i64 = 300;

/// Parsed `Stripe-Signature` header
#[derive(Debug, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    pub fn parse(header: &str) -> Result<Self> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for part in header.split(',') {
            let Some((key, value)) = part.trim().split_once('=') else {
                continue;
            };
            match key {
                "t" => timestamp = value.parse::<i64>().ok(),
                // Malformed hex can never match; skip it rather than fail the header
                "v1" => {
                    if let Ok(bytes) = hex::decode(value) {
                        signatures.push(bytes);
                    }
                }
                _ => {}
            }
        }

        let timestamp = timestamp
            .ok_or_else(|| PaymentError::WebhookSignature("missing timestamp".into()))?;
        if signatures.is_empty() {
            return Err(PaymentError::WebhookSignature("no v1 signature".into()));
        }

        Ok(Self {
            timestamp,
            signatures,
        })
    }
}

/// Verify a signature header against the raw request body
pub fn verify(payload: &[u8], header: &str, secret: &str) -> Result<()> {
    verify_at(payload, header, secret, Utc::now().timestamp())
}

/// Verify against an explicit clock
pub fn verify_at(payload: &[u8], header: &str, secret: &str, now: i64) -> Result<()> {
    let parsed = SignatureHeader::parse(header)?;

    let age = now
        .checked_sub(parsed.timestamp)
        .ok_or_else(|| PaymentError::WebhookSignature("timestamp out of range".into()))?;
    if age.unsigned_abs() > TOLERANCE_SECS.unsigned_abs() {
        return Err(PaymentError::WebhookSignature(format!(
            "timestamp outside tolerance (age {age}s)"
        )));
    }

    let mac = signed_mac(payload, parsed.timestamp, secret)?;

    // verify_slice compares in constant time
    if parsed
        .signatures
        .iter()
        .any(|sig| mac.clone().verify_slice(sig).is_ok())
    {
        Ok(())
    } else {
        Err(PaymentError::WebhookSignature("signature mismatch".into()))
    }
}

/// Produce a header value the way the processor does
pub fn sign(payload: &[u8], secret: &str, timestamp: i64) -> Result<String> {
    let mac = signed_mac(payload, timestamp, secret)?;
    Ok(format!(
        "t={timestamp},v1={}",
        hex::encode(mac.finalize().into_bytes())
    ))
}

fn signed_mac(payload: &[u8], timestamp: i64, secret: &str) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| PaymentError::Config("invalid webhook secret".into()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";
    const NOW: i64 = 1_700_000_000;

    #[test]
    fn test_valid_signature() {
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let header = sign(payload, SECRET, NOW).unwrap();
        assert!(verify_at(payload, &header, SECRET, NOW).is_ok());
    }

    #[test]
    fn test_wrong_secret() {
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let header = sign(payload, "whsec_other", NOW).unwrap();
        assert!(verify_at(payload, &header, SECRET, NOW).is_err());
    }

    #[test]
    fn test_tampered_body() {
        let original = br#"{"metadata":{"userId":"u1"}}"#;
        let tampered = br#"{"metadata":{"userId":"u2"}}"#;
        let header = sign(original, SECRET, NOW).unwrap();
        assert!(verify_at(tampered, &header, SECRET, NOW).is_err());
    }

    #[test]
    fn test_reformatted_json_does_not_verify() {
        let raw = br#"{"a": 1,  "b": 2}"#;
        let header = sign(raw, SECRET, NOW).unwrap();
        let value: serde_json::Value = serde_json::from_slice(raw).unwrap();
        let reserialized = serde_json::to_vec(&value).unwrap();
        assert!(verify_at(&reserialized, &header, SECRET, NOW).is_err());
    }

    #[test]
    fn test_timestamp_tolerance() {
        let payload = b"{}";
        let header = sign(payload, SECRET, NOW - TOLERANCE_SECS - 1).unwrap();
        assert!(verify_at(payload, &header, SECRET, NOW).is_err());

        let header = sign(payload, SECRET, NOW + TOLERANCE_SECS + 1).unwrap();
        assert!(verify_at(payload, &header, SECRET, NOW).is_err());

        let header = sign(payload, SECRET, NOW - TOLERANCE_SECS).unwrap();
        assert!(verify_at(payload, &header, SECRET, NOW).is_ok());
    }

    #[test]
    fn test_extreme_timestamps_are_rejected() {
        let payload = b"{}";
        for t in [i64::MIN, i64::MAX, i64::MIN + 1] {
            let header = format!("t={t},v1={}", "00".repeat(32));
            assert!(matches!(
                verify_at(payload, &header, SECRET, NOW),
                Err(PaymentError::WebhookSignature(_))
            ));
        }
        assert!(verify(payload, "t=-9223372036854775808,v1=00", SECRET).is_err());
    }

    #[test]
    fn test_any_v1_may_match() {
        let payload = b"{}";
        let good = sign(payload, SECRET, NOW).unwrap();
        let good_sig = good.split("v1=").nth(1).unwrap();
        let header = format!("t={NOW},v1={},v0=legacy,v1={good_sig}", "00".repeat(32));
        assert!(verify_at(payload, &header, SECRET, NOW).is_ok());
    }

    #[test]
    fn test_malformed_headers() {
        assert!(SignatureHeader::parse("").is_err());
        assert!(SignatureHeader::parse("test_signature").is_err());
        assert!(SignatureHeader::parse("t=abc,v1=00").is_err());
        assert!(SignatureHeader::parse("t=1").is_err());
        assert!(SignatureHeader::parse("t=1,v1=zz").is_err());
        assert_eq!(
            SignatureHeader::parse("t=1,v1=0a0b").unwrap(),
            SignatureHeader {
                timestamp: 1,
                signatures: vec![vec![0x0a, 0x0b]],
            }
        );
    }
}
