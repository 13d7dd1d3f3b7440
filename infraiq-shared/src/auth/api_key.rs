/// API key utilities
///
/// Two kinds of keys reach the API:
///
/// - **Personal keys** (`iq_` prefix) are generated for every user and used by
///   the InfraIQ CLI. They are looked up in the `users` table.
/// - **Internal keys** are shared secrets configured on both the dashboard
///   frontend and the license server. An empty configured key never matches.
///
/// # Key Format
///
/// Personal keys are `iq_` followed by 32 random bytes encoded as URL-safe
/// base64 without padding (46 characters total).
///
/// # Example
///
/// ```
/// use infraiq_shared::auth::api_key::{generate_api_key, is_personal_key, internal_key_matches};
///
/// let key = generate_api_key();
/// assert!(is_personal_key(&key));
/// assert_eq!(key.len(), 46);
///
/// assert!(internal_key_matches("s3cret", "s3cret"));
/// assert!(!internal_key_matches("", ""));
/// ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;

/// Prefix of personal API keys
pub const PERSONAL_KEY_PREFIX: &str = "iq_";

/// Random bytes behind each personal key
const KEY_RANDOM_BYTES: usize = 32;

/// Generates a new personal API key
pub fn generate_api_key() -> String {
    let mut bytes = [0u8; KEY_RANDOM_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);

    format!("{}{}", PERSONAL_KEY_PREFIX, URL_SAFE_NO_PAD.encode(bytes))
}

/// Whether a presented `X-API-Key` value is shaped like a personal key
pub fn is_personal_key(key: &str) -> bool {
    key.starts_with(PERSONAL_KEY_PREFIX)
}

/// Checks a presented key against a configured internal key
///
/// An unset (empty) configured key never matches, so a deployment without
/// an internal key cannot be entered with an empty header.
pub fn internal_key_matches(presented: &str, configured: &str) -> bool {
    !configured.is_empty() && constant_time_compare(presented, configured)
}

/// Constant-time string comparison
///
/// Compares the full length of both strings without short-circuiting, so the
/// time taken doesn't reveal where they differ. Length mismatch returns early.
///
/// # Example
///
/// ```
/// use infraiq_shared::auth::api_key::constant_time_compare;
///
/// assert!(constant_time_compare("hello", "hello"));
/// assert!(!constant_time_compare("hello", "world"));
/// ```
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
