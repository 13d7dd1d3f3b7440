/// Svix webhook signatures (Clerk)
///
/// Clerk delivers webhooks through Svix. Each delivery carries three headers:
///
/// - `svix-id`: unique message id
/// - `svix-timestamp`: Unix timestamp of the attempt
/// - `svix-signature`: space-separated list of `v1,<base64 signature>`
///
/// The signature is the base64 HMAC-SHA256 of `"{id}.{timestamp}.{raw body}"`,
/// keyed with the base64-decoded part of the secret after `whsec_`.

use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::Mac;

use super::{check_timestamp, HmacSha256, SignatureError};

pub const ID_HEADER: &str = "svix-id";
pub const TIMESTAMP_HEADER: &str = "svix-timestamp";
pub const SIGNATURE_HEADER: &str = "svix-signature";

const SECRET_PREFIX: &str = "whsec_";

/// The three Svix headers of one delivery
#[derive(Debug, Clone, Copy)]
pub struct SvixHeaders<'a> {
    pub id: &'a str,
    pub timestamp: &'a str,
    pub signature: &'a str,
}

impl<'a> SvixHeaders<'a> {
    /// Collects the headers, reporting the first one missing
    pub fn from_parts(
        id: Option<&'a str>,
        timestamp: Option<&'a str>,
        signature: Option<&'a str>,
    ) -> Result<Self, SignatureError> {
        Ok(Self {
            id: id.ok_or(SignatureError::MissingHeader(ID_HEADER))?,
            timestamp: timestamp.ok_or(SignatureError::MissingHeader(TIMESTAMP_HEADER))?,
            signature: signature.ok_or(SignatureError::MissingHeader(SIGNATURE_HEADER))?,
        })
    }
}

fn mac(secret: &str, id: &str, timestamp: &str, payload: &[u8]) -> Result<HmacSha256, SignatureError> {
    let encoded = secret.strip_prefix(SECRET_PREFIX).unwrap_or(secret);
    let key = STANDARD
        .decode(encoded)
        .map_err(|_| SignatureError::InvalidSecret)?;

    let mut mac = HmacSha256::new_from_slice(&key).map_err(|_| SignatureError::InvalidSecret)?;
    mac.update(id.as_bytes());
    mac.update(b".");
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Verifies a Svix delivery against the raw body
///
/// # Errors
///
/// Returns a [`SignatureError`] when the secret is not valid base64, the
/// timestamp is outside the tolerance window, or no `v1` signature matches.
pub fn verify(
    payload: &[u8],
    headers: &SvixHeaders<'_>,
    secret: &str,
    now: i64,
) -> Result<(), SignatureError> {
    check_timestamp(headers.timestamp, now)?;

    let expected = mac(secret, headers.id, headers.timestamp, payload)?;

    let matched = headers
        .signature
        .split_whitespace()
        .filter_map(|entry| entry.split_once(','))
        .filter(|(version, _)| *version == "v1")
        .any(|(_, sig)| {
            STANDARD
                .decode(sig)
                .map(|bytes| expected.clone().verify_slice(&bytes).is_ok())
                .unwrap_or(false)
        });

    if matched {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Produces the `svix-signature` value for a payload
pub fn sign(payload: &[u8], secret: &str, id: &str, timestamp: i64) -> Result<String, SignatureError> {
    let mac = mac(secret, id, &timestamp.to_string(), payload)?;
    Ok(format!("v1,{}", STANDARD.encode(mac.finalize().into_bytes())))
}
