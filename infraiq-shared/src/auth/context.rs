/// Request principal and credential resolution
///
/// Every authenticated request ends up with an [`AuthContext`] in its
/// extensions. Resolving one from the request headers follows a fixed order,
/// first match wins:
///
/// 1. Internal shared key, as `X-Internal-Key` or as the `X-API-Key` value
/// 2. Personal key (`iq_...`) in `X-API-Key`, looked up in the database;
///    any other `X-API-Key` value is rejected
/// 3. `Authorization: Bearer <token>`: a `test_` token in development, else a
///    Clerk session token
///
/// The header inspection is pure and lives here; the database lookup and the
/// Clerk verification are performed by the caller for the
/// [`Resolution::PersonalKey`] and [`Resolution::SessionToken`] outcomes.
///
/// # Example
///
/// ```
/// use infraiq_shared::auth::context::{AuthMethod, Credentials, Resolution};
///
/// let credentials = Credentials {
///     internal_key: None,
///     api_key: Some("dashboard-key"),
///     authorization: None,
/// };
///
/// match credentials.resolve("dashboard-key", false).unwrap() {
///     Resolution::Authenticated(ctx) => assert_eq!(ctx.method, AuthMethod::InternalKey),
///     _ => unreachable!(),
/// }
/// ```

use serde::{Deserialize, Serialize};

use super::api_key::{internal_key_matches, is_personal_key};

/// Principal id of requests made with the internal key
pub const INTERNAL_PRINCIPAL: &str = "internal_dashboard";

/// Prefix of development bearer tokens
pub const DEV_TOKEN_PREFIX: &str = "test_";

/// Authentication method used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// Shared internal key (dashboard frontend)
    InternalKey,

    /// Personal `iq_` API key
    ApiKey,

    /// Verified Clerk session token
    ClerkSession,

    /// Development `test_` bearer token
    DevToken,
}

/// Authentication context added to request extensions
///
/// Handlers extract it with `Extension<AuthContext>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    /// Resolved principal id, used as the owner of projects and scans
    pub user_id: String,

    /// How the principal was authenticated
    pub method: AuthMethod,
}

impl AuthContext {
    /// Context for the internal dashboard principal
    pub fn internal() -> Self {
        Self {
            user_id: INTERNAL_PRINCIPAL.to_string(),
            method: AuthMethod::InternalKey,
        }
    }

    /// Context for a user authenticated with a personal key
    pub fn from_api_key(clerk_id: impl Into<String>) -> Self {
        Self {
            user_id: clerk_id.into(),
            method: AuthMethod::ApiKey,
        }
    }

    /// Context for a verified Clerk session
    pub fn from_session(clerk_id: impl Into<String>) -> Self {
        Self {
            user_id: clerk_id.into(),
            method: AuthMethod::ClerkSession,
        }
    }

    /// Whether this is the internal dashboard principal
    pub fn is_internal(&self) -> bool {
        self.method == AuthMethod::InternalKey
    }

    /// Checks that the principal may act on behalf of `clerk_id`
    ///
    /// The internal principal may act for anyone; everyone else only for
    /// themselves.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Forbidden`] when acting for another user.
    pub fn ensure_acting_for(&self, clerk_id: &str) -> Result<(), AuthError> {
        if self.is_internal() || self.user_id == clerk_id {
            Ok(())
        } else {
            Err(AuthError::Forbidden(
                "Cannot access another user's account".to_string(),
            ))
        }
    }
}

/// Error type for authentication
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Nothing usable was presented
    #[error("Authentication required. Use X-API-Key header or a Bearer token.")]
    MissingCredentials,

    /// `X-Internal-Key` was presented but does not match
    #[error("Invalid internal key")]
    InvalidInternalKey,

    /// `X-API-Key` is neither the internal key nor a known personal key
    #[error("Invalid API key")]
    InvalidApiKey,

    /// `Authorization` header is not `Bearer <token>`
    #[error("Invalid authorization format. Use 'Bearer <token>'")]
    InvalidAuthorizationFormat,

    /// Bearer token failed verification
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Session tokens cannot be verified right now (Clerk unreachable or unconfigured)
    #[error("Session verification unavailable: {0}")]
    VerificationUnavailable(String),

    /// Authenticated, but not allowed to act on the target
    #[error("{0}")]
    Forbidden(String),
}

/// Raw credential headers of a request
#[derive(Debug, Clone, Copy, Default)]
pub struct Credentials<'a> {
    /// `X-Internal-Key`
    pub internal_key: Option<&'a str>,

    /// `X-API-Key`
    pub api_key: Option<&'a str>,

    /// `Authorization`
    pub authorization: Option<&'a str>,
}

/// Outcome of inspecting the credential headers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<'a> {
    /// Fully authenticated without further checks
    Authenticated(AuthContext),

    /// Personal key that must be looked up
    PersonalKey(&'a str),

    /// Bearer token that must be verified
    SessionToken(&'a str),
}

impl<'a> Credentials<'a> {
    /// Resolves the API key headers alone (steps 1 and 2)
    ///
    /// Returns `Ok(None)` when no key header decides the request, leaving the
    /// `Authorization` header to the caller.
    pub fn resolve_keys(&self, internal_api_key: &str) -> Result<Option<Resolution<'a>>, AuthError> {
        let internal_presented = [self.internal_key, self.api_key]
            .into_iter()
            .flatten()
            .any(|key| internal_key_matches(key, internal_api_key));

        if internal_presented {
            return Ok(Some(Resolution::Authenticated(AuthContext::internal())));
        }

        match self.api_key {
            Some(key) if is_personal_key(key) => Ok(Some(Resolution::PersonalKey(key))),
            Some(_) => Err(AuthError::InvalidApiKey),
            None => Ok(None),
        }
    }

    /// Resolves all credential headers in precedence order
    ///
    /// `allow_dev_tokens` enables `test_` bearer tokens (development only).
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] when the headers are missing or malformed.
    pub fn resolve(
        &self,
        internal_api_key: &str,
        allow_dev_tokens: bool,
    ) -> Result<Resolution<'a>, AuthError> {
        if let Some(resolution) = self.resolve_keys(internal_api_key)? {
            return Ok(resolution);
        }

        if let Some(header) = self.authorization {
            let token = bearer_token(header)?;

            if allow_dev_tokens && token.starts_with(DEV_TOKEN_PREFIX) {
                return Ok(Resolution::Authenticated(AuthContext {
                    user_id: token.to_string(),
                    method: AuthMethod::DevToken,
                }));
            }

            return Ok(Resolution::SessionToken(token));
        }

        if self.internal_key.is_some() {
            return Err(AuthError::InvalidInternalKey);
        }

        Err(AuthError::MissingCredentials)
    }
}

/// Extracts the token of an `Authorization: Bearer <token>` header
pub fn bearer_token(header: &str) -> Result<&str, AuthError> {
    let token = header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidAuthorizationFormat)?
        .trim();

    if token.is_empty() {
        return Err(AuthError::InvalidAuthorizationFormat);
    }

    Ok(token)
}
