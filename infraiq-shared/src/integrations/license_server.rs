/// License server client
///
/// The license server owns license keys; this API only mirrors the resulting
/// tier onto users. Two calls are used:
///
/// - `POST /api/v1/licenses/validate` with `{license_key}`
/// - `GET /api/v1/licenses/status?email=` (404 when the email has no license)

use serde::{Deserialize, Serialize};

use super::{endpoint, IntegrationError};

const SERVICE: &str = "License server";

/// License server settings
#[derive(Debug, Clone)]
pub struct LicenseServerConfig {
    /// Base URL of the license server
    pub url: String,
}

impl Default for LicenseServerConfig {
    fn default() -> Self {
        Self {
            url: "https://license.autonops.io".to_string(),
        }
    }
}

/// Result of validating a license key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseValidation {
    pub valid: bool,

    #[serde(default)]
    pub tier: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub message: Option<String>,

    #[serde(default)]
    pub expires_at: Option<String>,
}

/// License held by an email address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseStatus {
    pub tier: String,
    pub active: bool,

    #[serde(default)]
    pub expires_at: Option<String>,
}

#[derive(Debug, Serialize)]
struct ValidateRequest<'a> {
    license_key: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    detail: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LicenseServerClient {
    http: reqwest::Client,
    config: LicenseServerConfig,
}

impl LicenseServerClient {
    pub fn new(http: reqwest::Client, config: LicenseServerConfig) -> Self {
        Self { http, config }
    }

    /// Validates a license key
    ///
    /// A 4xx answer means the server rejected the key and is reported as an
    /// invalid license rather than an error.
    pub async fn validate(&self, license_key: &str) -> Result<LicenseValidation, IntegrationError> {
        let response = self
            .http
            .post(endpoint(&self.config.url, "/api/v1/licenses/validate"))
            .json(&ValidateRequest { license_key })
            .send()
            .await
            .map_err(|e| IntegrationError::unreachable(SERVICE, e))?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Ok(LicenseValidation {
                valid: false,
                message: Some(rejection_message(&body)),
                ..Default::default()
            });
        }

        if !status.is_success() {
            return Err(IntegrationError::Upstream {
                service: SERVICE,
                status: status.as_u16(),
                message: format!("License validation failed with HTTP {}", status),
            });
        }

        response
            .json()
            .await
            .map_err(|e| IntegrationError::invalid_response(SERVICE, e))
    }

    /// License status of an email address, `None` when it holds no license
    pub async fn status(&self, email: &str) -> Result<Option<LicenseStatus>, IntegrationError> {
        let response = self
            .http
            .get(endpoint(&self.config.url, "/api/v1/licenses/status"))
            .query(&[("email", email)])
            .send()
            .await
            .map_err(|e| IntegrationError::unreachable(SERVICE, e))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IntegrationError::Upstream {
                service: SERVICE,
                status: status.as_u16(),
                message: rejection_message(&body),
            });
        }

        response
            .json()
            .await
            .map(Some)
            .map_err(|e| IntegrationError::invalid_response(SERVICE, e))
    }
}

/// Best-effort human message from an error body
fn rejection_message(body: &str) -> String {
    serde_json::from_str::<ErrorDetail>(body)
        .ok()
        .and_then(|detail| detail.detail.or(detail.message))
        .unwrap_or_else(|| "Invalid license key".to_string())
}
