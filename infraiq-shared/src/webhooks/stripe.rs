/// Stripe webhook signatures
///
/// The `Stripe-Signature` header looks like `t=1700000000,v1=5257a8...,v1=...`.
/// Each `v1` entry is the hex HMAC-SHA256 of `"{t}.{raw body}"` keyed with the
/// endpoint secret (`whsec_...`, used as-is). Several `v1` entries appear while
/// a secret is being rolled; any match is accepted.
///
/// # Example
///
/// ```
/// use infraiq_shared::webhooks::stripe::{sign, verify};
///
/// let body = br#"{"type":"invoice.payment_failed"}"#;
/// let header = sign(body, "whsec_test", 1_700_000_000);
/// assert!(verify(body, &header, "whsec_test", 1_700_000_010).is_ok());
/// ```

use hmac::Mac;

use super::{check_timestamp, HmacSha256, SignatureError};

/// Header carrying the signature
pub const SIGNATURE_HEADER: &str = "stripe-signature";

fn mac(secret: &str, timestamp: &str, payload: &[u8]) -> Result<HmacSha256, SignatureError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::InvalidSecret)?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Verifies a `Stripe-Signature` header against the raw body
///
/// # Errors
///
/// Returns a [`SignatureError`] when the header is malformed, the timestamp
/// is outside the tolerance window, or no `v1` signature matches.
pub fn verify(payload: &[u8], header: &str, secret: &str, now: i64) -> Result<(), SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        if let Some(t) = part.trim().strip_prefix("t=") {
            timestamp = Some(t);
        } else if let Some(sig) = part.trim().strip_prefix("v1=") {
            signatures.push(sig);
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::InvalidFormat)?;
    if signatures.is_empty() {
        return Err(SignatureError::InvalidFormat);
    }

    check_timestamp(timestamp, now)?;

    let expected = mac(secret, timestamp, payload)?;

    let matched = signatures.iter().any(|sig| {
        hex::decode(sig)
            .map(|bytes| expected.clone().verify_slice(&bytes).is_ok())
            .unwrap_or(false)
    });

    if matched {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Produces a `Stripe-Signature` header for a payload
///
/// Used to exercise webhook handlers in tests and local tooling.
pub fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let timestamp = timestamp.to_string();
    let signature = mac(secret, &timestamp, payload)
        .map(|mac| hex::encode(mac.finalize().into_bytes()))
        .unwrap_or_default();

    format!("t={},v1={}", timestamp, signature)
}
