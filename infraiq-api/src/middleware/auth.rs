/// Authentication middleware
///
/// Two layers are provided:
///
/// - [`require_auth`]: the full credential chain of dashboard and CLI
///   callers, inserting an [`AuthContext`] into the request extensions
/// - [`require_service_key`]: the internal service key of the license server
///
/// The header precedence lives in
/// [`Credentials::resolve`](infraiq_shared::auth::context::Credentials::resolve);
/// this module adds the database lookup of personal keys and the Clerk
/// verification of session tokens.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use infraiq_shared::{
    auth::{
        api_key::internal_key_matches,
        context::{AuthContext, AuthError, Credentials, Resolution},
    },
    models::user::User,
};

use crate::{app::AppState, error::ApiError};

/// Shared key header
pub const INTERNAL_KEY_HEADER: &str = "x-internal-key";

/// Personal or shared API key header
pub const API_KEY_HEADER: &str = "x-api-key";

/// Borrows the credential headers of a request
///
/// Headers that are not valid visible ASCII are treated as absent.
pub fn credentials(headers: &HeaderMap) -> Credentials<'_> {
    Credentials {
        internal_key: header_str(headers, INTERNAL_KEY_HEADER),
        api_key: header_str(headers, API_KEY_HEADER),
        authorization: header_str(headers, header::AUTHORIZATION.as_str()),
    }
}

/// Value of a header as text, `None` when absent or not visible ASCII
pub fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Resolves the principal of a request
///
/// # Errors
///
/// - `401` when credentials are missing, malformed or unknown
/// - `503` when a session token cannot be verified because Clerk is unavailable
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<AuthContext, ApiError> {
    let resolution = credentials(headers).resolve(
        &state.config.auth.internal_api_key,
        state.config.api.is_development(),
    )?;

    match resolution {
        Resolution::Authenticated(ctx) => Ok(ctx),
        Resolution::PersonalKey(key) => personal_key_context(state, key).await,
        Resolution::SessionToken(token) => {
            let claims = state.clerk.verify_session(token).await?;
            Ok(AuthContext::from_session(claims.sub))
        }
    }
}

/// Looks up the owner of a personal `iq_` key
pub async fn personal_key_context(state: &AppState, key: &str) -> Result<AuthContext, ApiError> {
    match User::find_by_api_key(&state.db, key).await? {
        Some(user) => Ok(AuthContext::from_api_key(user.clerk_id)),
        None => {
            tracing::debug!("Unknown personal API key presented");
            Err(AuthError::InvalidApiKey.into())
        }
    }
}

/// Requires any accepted credential and stores the principal
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx = authenticate(&state, req.headers()).await?;

    tracing::debug!(user_id = %ctx.user_id, method = ?ctx.method, "Request authenticated");
    req.extensions_mut().insert(ctx);

    Ok(next.run(req).await)
}

/// Requires `X-Internal-Key` to match the internal service key
pub async fn require_service_key(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let presented = header_str(req.headers(), INTERNAL_KEY_HEADER).unwrap_or_default();

    if state.config.auth.internal_service_key.is_empty() {
        tracing::warn!("INTERNAL_SERVICE_KEY not configured, rejecting service call");
    }

    if !internal_key_matches(presented, &state.config.auth.internal_service_key) {
        return Err(AuthError::InvalidInternalKey.into());
    }

    Ok(next.run(req).await)
}
