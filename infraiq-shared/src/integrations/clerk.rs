/// Clerk client and webhook payloads
///
/// The API never sees Clerk passwords or sessions directly: the dashboard
/// sends Clerk session tokens, which are verified against the instance's
/// JWKS (`GET {api_url}/v1/jwks`, authenticated with the secret key). The key
/// set is fetched for each verification; nothing is cached.

use serde::Deserialize;

use super::{endpoint, IntegrationError};
use crate::auth::context::AuthError;
use crate::auth::jwt::{verify_session_token, JwkSet, JwtError, SessionClaims};

const SERVICE: &str = "Clerk";

/// Clerk settings
#[derive(Debug, Clone)]
pub struct ClerkConfig {
    /// Backend secret key (`sk_...`); empty disables session verification
    pub secret_key: String,

    /// Svix signing secret of the webhook endpoint (`whsec_...`)
    pub webhook_secret: String,

    /// Backend API base URL
    pub api_url: String,
}

impl Default for ClerkConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            webhook_secret: String::new(),
            api_url: "https://api.clerk.com".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClerkClient {
    http: reqwest::Client,
    config: ClerkConfig,
}

impl ClerkClient {
    pub fn new(http: reqwest::Client, config: ClerkConfig) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &ClerkConfig {
        &self.config
    }

    /// Fetches the instance's JSON Web Key Set
    pub async fn fetch_jwks(&self) -> Result<JwkSet, IntegrationError> {
        if self.config.secret_key.is_empty() {
            return Err(IntegrationError::NotConfigured(SERVICE));
        }

        let response = self
            .http
            .get(endpoint(&self.config.api_url, "/v1/jwks"))
            .bearer_auth(&self.config.secret_key)
            .send()
            .await
            .map_err(|e| IntegrationError::unreachable(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(IntegrationError::Upstream {
                service: SERVICE,
                status: status.as_u16(),
                message: format!("JWKS request failed with HTTP {}", status),
            });
        }

        response
            .json()
            .await
            .map_err(|e| IntegrationError::invalid_response(SERVICE, e))
    }

    /// Verifies a session token and returns its claims
    ///
    /// # Errors
    ///
    /// [`AuthError::VerificationUnavailable`] when the key set cannot be
    /// fetched, [`AuthError::InvalidToken`] when the token does not verify.
    pub async fn verify_session(&self, token: &str) -> Result<SessionClaims, AuthError> {
        let jwks = self
            .fetch_jwks()
            .await
            .map_err(|e| AuthError::VerificationUnavailable(e.to_string()))?;

        verify_session_token(token, &jwks).map_err(|e| {
            tracing::debug!(error = %e, "Session token rejected");
            match e {
                JwtError::Expired => AuthError::InvalidToken("Token has expired".to_string()),
                other => AuthError::InvalidToken(other.to_string()),
            }
        })
    }
}

/// Clerk webhook envelope
#[derive(Debug, Clone, Deserialize)]
pub struct ClerkEvent {
    #[serde(rename = "type")]
    pub event_type: String,

    pub data: serde_json::Value,
}

/// Email entry of a Clerk user
#[derive(Debug, Clone, Deserialize)]
pub struct ClerkEmailAddress {
    pub id: Option<String>,
    pub email_address: String,
}

/// `data` of `user.created` / `user.updated`
#[derive(Debug, Clone, Deserialize)]
pub struct ClerkUser {
    pub id: String,

    #[serde(default)]
    pub email_addresses: Vec<ClerkEmailAddress>,

    pub primary_email_address_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl ClerkUser {
    /// Primary email, falling back to the first address
    pub fn primary_email(&self) -> Option<&str> {
        self.primary_email_address_id
            .as_deref()
            .and_then(|primary| {
                self.email_addresses
                    .iter()
                    .find(|address| address.id.as_deref() == Some(primary))
            })
            .or_else(|| self.email_addresses.first())
            .map(|address| address.email_address.as_str())
    }

    /// First and last name joined, `None` when both are blank
    pub fn display_name(&self) -> Option<String> {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        (!name.is_empty()).then_some(name)
    }
}

/// `data` of `user.deleted`
#[derive(Debug, Clone, Deserialize)]
pub struct DeletedClerkUser {
    pub id: Option<String>,
}
