/// Outbound HTTP clients
///
/// # Modules
///
/// - [`stripe`]: Checkout and billing portal sessions, plus webhook payload types
/// - [`clerk`]: JWKS retrieval for session tokens, plus webhook payload types
/// - [`license_server`]: License key validation and per-email license status
///
/// All clients share one `reqwest::Client` built with the configured upstream
/// timeout, and report failures as [`IntegrationError`].

pub mod clerk;
pub mod license_server;
pub mod stripe;

/// Error type for calls to external services
#[derive(Debug, thiserror::Error)]
pub enum IntegrationError {
    /// Required credentials for the service are not configured
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    /// Connection failure or timeout
    #[error("{service} is unreachable: {message}")]
    Unreachable {
        service: &'static str,
        message: String,
    },

    /// Service answered with a non-success status
    #[error("{service} returned {status}: {message}")]
    Upstream {
        service: &'static str,
        status: u16,
        message: String,
    },

    /// Service answered with a body that could not be decoded
    #[error("Invalid response from {service}: {message}")]
    InvalidResponse {
        service: &'static str,
        message: String,
    },
}

impl IntegrationError {
    pub(crate) fn unreachable(service: &'static str, err: reqwest::Error) -> Self {
        tracing::warn!(service, error = %err, "Upstream request failed");
        Self::Unreachable {
            service,
            message: err.to_string(),
        }
    }

    pub(crate) fn invalid_response(service: &'static str, err: impl std::fmt::Display) -> Self {
        Self::InvalidResponse {
            service,
            message: err.to_string(),
        }
    }

    /// True when the service rejected the request itself (4xx)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Upstream { status, .. } if (400..500).contains(status))
    }
}

/// Joins a base URL and a path without doubling slashes
pub(crate) fn endpoint(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
