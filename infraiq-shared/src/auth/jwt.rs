/// Clerk session token verification
///
/// Clerk signs session tokens with RS256. The public keys are published as a
/// JSON Web Key Set; this module picks the key named by the token's `kid`
/// header and validates signature and expiry with `jsonwebtoken`.
///
/// Fetching the key set is done by [`crate::integrations::clerk::ClerkClient`];
/// verification here is pure so it can be tested without network access.
///
/// # Example
///
/// ```no_run
/// use infraiq_shared::auth::jwt::{verify_session_token, JwkSet};
///
/// # fn example(jwks: JwkSet, token: &str) -> Result<(), Box<dyn std::error::Error>> {
/// let claims = verify_session_token(token, &jwks)?;
/// println!("Authenticated Clerk user {}", claims.sub);
/// # Ok(())
/// # }
/// ```

use jsonwebtoken::{decode, decode_header, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Error type for session token verification
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Token is not a well-formed JWT
    #[error("Invalid token format: {0}")]
    InvalidFormat(String),

    /// Token header carries no key id
    #[error("Token has no key id")]
    MissingKeyId,

    /// No RSA key in the key set matches the token's key id
    #[error("Unknown signing key: {0}")]
    UnknownKey(String),

    /// Key set entry could not be turned into a decoding key
    #[error("Invalid signing key: {0}")]
    InvalidKey(String),

    /// Token has expired
    #[error("Token has expired")]
    Expired,

    /// Signature or claims failed validation
    #[error("Failed to validate token: {0}")]
    ValidationError(String),
}

/// One entry of a JSON Web Key Set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type (`RSA` for Clerk)
    pub kty: String,

    /// Key id referenced by token headers
    pub kid: Option<String>,

    /// Intended algorithm, if declared
    pub alg: Option<String>,

    /// RSA modulus (base64url)
    pub n: Option<String>,

    /// RSA exponent (base64url)
    pub e: Option<String>,
}

/// JSON Web Key Set as served by `GET /v1/jwks`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    /// Finds the RS256-capable RSA key with the given key id
    pub fn find_rsa_key(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|jwk| {
            jwk.kty == "RSA"
                && jwk.kid.as_deref() == Some(kid)
                && jwk.alg.as_deref().map_or(true, |alg| alg == "RS256")
        })
    }
}

/// Claims of a Clerk session token that the API relies on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Clerk user id (`user_...`)
    pub sub: String,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    #[serde(default)]
    pub iat: Option<i64>,

    /// Issuer (the Clerk frontend API)
    #[serde(default)]
    pub iss: Option<String>,

    /// Session id
    #[serde(default)]
    pub sid: Option<String>,

    /// Authorized party (origin that requested the token)
    #[serde(default)]
    pub azp: Option<String>,
}

/// Verifies a Clerk session token against a key set
///
/// # Errors
///
/// Returns [`JwtError`] if the token is malformed, its key is not in the
/// set, the signature does not verify, or it has expired.
pub fn verify_session_token(token: &str, jwks: &JwkSet) -> Result<SessionClaims, JwtError> {
    let header = decode_header(token).map_err(|e| JwtError::InvalidFormat(e.to_string()))?;

    if header.alg != Algorithm::RS256 {
        return Err(JwtError::ValidationError(format!(
            "Unsupported algorithm {:?}",
            header.alg
        )));
    }

    let kid = header.kid.ok_or(JwtError::MissingKeyId)?;
    let jwk = jwks
        .find_rsa_key(&kid)
        .ok_or_else(|| JwtError::UnknownKey(kid.clone()))?;

    let (n, e) = match (jwk.n.as_deref(), jwk.e.as_deref()) {
        (Some(n), Some(e)) => (n, e),
        _ => return Err(JwtError::InvalidKey(format!("Key {} has no RSA components", kid))),
    };

    let key = DecodingKey::from_rsa_components(n, e)
        .map_err(|e| JwtError::InvalidKey(e.to_string()))?;

    let mut validation = Validation::new(Algorithm::RS256);
    // Clerk session tokens carry no audience
    validation.validate_aud = false;

    let token_data = decode::<SessionClaims>(token, &key, &validation).map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => JwtError::Expired,
        _ => JwtError::ValidationError(e.to_string()),
    })?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn rsa_jwk(kid: &str, alg: Option<&str>) -> Jwk {
        Jwk {
            kty: "RSA".to_string(),
            kid: Some(kid.to_string()),
            alg: alg.map(str::to_string),
            n: Some("sXchDaQebHnPiGvyDOAT4saGEUetSyo9MKLOoWFsueri23bOdgWp4Dy1WlUzewbgBHod5pcM9H95GQRV3JDXboIRROSBigeC5yjU1hGzHHyXss8UDprecbAYxknTcQkhslANGRUZmdTOQ5qTRsLAt6BTYuyvVRdhS8exSZEy_c4gs_7svlJJQ4H9_NxsiIoLwAEk7-Q3UXERGYw_75IDrGA84-lA_-Ct4eTlXHBIY2EaV7t7LjJaynVJCpkv4LKjTTAumiGUIuQhrNhZLuF_RJLqHpM2kgWFLU7-VTdL1VbC2tejvcI2BlMkEpk1BzBZI0KQB0GaDWFLN-aEAw3vRw".to_string()),
            e: Some("AQAB".to_string()),
        }
    }

    fn hs256_token(kid: Option<&str>) -> String {
        let mut header = Header::new(Algorithm::HS256);
        header.kid = kid.map(str::to_string);
        let claims = SessionClaims {
            sub: "user_2abc".to_string(),
            exp: chrono::Utc::now().timestamp() + 600,
            iat: None,
            iss: None,
            sid: None,
            azp: None,
        };
        encode(&header, &claims, &EncodingKey::from_secret(b"not-a-clerk-key")).unwrap()
    }

    #[test]
    fn test_find_rsa_key() {
        let jwks = JwkSet {
            keys: vec![
                Jwk {
                    kty: "EC".to_string(),
                    kid: Some("ec-key".to_string()),
                    alg: Some("ES256".to_string()),
                    n: None,
                    e: None,
                },
                rsa_jwk("ins_1", Some("RS256")),
                rsa_jwk("ins_2", None),
                rsa_jwk("ins_3", Some("RS512")),
            ],
        };

        assert!(jwks.find_rsa_key("ins_1").is_some());
        assert!(jwks.find_rsa_key("ins_2").is_some());
        assert!(jwks.find_rsa_key("ins_3").is_none());
        assert!(jwks.find_rsa_key("ec-key").is_none());
        assert!(jwks.find_rsa_key("missing").is_none());
    }

    #[test]
    fn test_rejects_malformed_token() {
        let result = verify_session_token("not-a-jwt", &JwkSet::default());
        assert!(matches!(result, Err(JwtError::InvalidFormat(_))));
    }

    #[test]
    fn test_rejects_symmetric_algorithm() {
        let jwks = JwkSet {
            keys: vec![rsa_jwk("ins_1", Some("RS256"))],
        };
        let result = verify_session_token(&hs256_token(Some("ins_1")), &jwks);
        assert!(matches!(result, Err(JwtError::ValidationError(_))));
    }

    #[test]
    fn test_jwks_deserializes_clerk_shape() {
        let body = r#"{"keys":[{"use":"sig","kty":"RSA","kid":"ins_abc","alg":"RS256","n":"xyz","e":"AQAB"}]}"#;
        let jwks: JwkSet = serde_json::from_str(body).unwrap();
        assert_eq!(jwks.keys.len(), 1);
        assert_eq!(jwks.keys[0].kid.as_deref(), Some("ins_abc"));
    }
}
