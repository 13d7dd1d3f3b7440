/// Inbound webhook signature verification
///
/// # Modules
///
/// - [`stripe`]: `Stripe-Signature` header (`t=...,v1=...`)
/// - [`svix`]: Svix headers used by Clerk (`svix-id`, `svix-timestamp`, `svix-signature`)
///
/// Both schemes sign the raw request body with HMAC-SHA256 and bound the
/// timestamp to five minutes around the current time to limit replays. The
/// verifiers take `now` explicitly so they can be tested deterministically.

pub mod stripe;
pub mod svix;

use hmac::Hmac;
use sha2::Sha256;

pub(crate) type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a signed timestamp (seconds)
pub const TIMESTAMP_TOLERANCE_SECS: i64 = 300;

/// Error type for webhook signature verification
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    /// A required signature header is absent
    #[error("Missing webhook header: {0}")]
    MissingHeader(&'static str),

    /// Signature header could not be parsed
    #[error("Invalid signature header format")]
    InvalidFormat,

    /// Timestamp is not a Unix timestamp
    #[error("Invalid timestamp in signature")]
    InvalidTimestamp,

    /// Timestamp is outside the tolerance window
    #[error("Webhook timestamp outside tolerance")]
    TimestampOutOfTolerance,

    /// Configured secret cannot be used as an HMAC key
    #[error("Invalid webhook secret")]
    InvalidSecret,

    /// No signature matched the payload
    #[error("Invalid signature")]
    Mismatch,
}

/// Parses a Unix timestamp and checks it against the tolerance window
///
/// Timestamps from the future are accepted within the same window to absorb
/// clock skew.
pub(crate) fn check_timestamp(timestamp: &str, now: i64) -> Result<i64, SignatureError> {
    let timestamp: i64 = timestamp
        .trim()
        .parse()
        .map_err(|_| SignatureError::InvalidTimestamp)?;

    if (now - timestamp).abs() > TIMESTAMP_TOLERANCE_SECS {
        tracing::warn!(
            age_secs = now - timestamp,
            max_secs = TIMESTAMP_TOLERANCE_SECS,
            "Webhook rejected: timestamp outside tolerance"
        );
        return Err(SignatureError::TimestampOutOfTolerance);
    }

    Ok(timestamp)
}
