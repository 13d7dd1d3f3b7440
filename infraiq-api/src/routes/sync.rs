/// CLI scan upload
///
/// `infraiq <tool> --sync` posts its results here. The CLI usually only has a
/// license key, so owner resolution differs from the dashboard chain:
///
/// 1. Internal key or personal `iq_` key in the API key headers, as usual
/// 2. `Authorization: Bearer <license key>`, validated against the license
///    server; the owner is the Clerk id of the user holding the license
///    email, or `license:<first 16 characters of the key>` when no dashboard
///    user has that email
///
/// # Endpoints
///
/// - `POST /api/sync` - Upload one scan
/// - `GET /api/sync/status` - Connectivity check (public)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extractors::Json,
    middleware::auth::{credentials, personal_key_context},
    routes::scans::ScanPayload,
};
use axum::{body::Bytes, extract::State, http::HeaderMap};
use infraiq_shared::{
    auth::context::{bearer_token, AuthError, Resolution},
    models::{scan::Scan, user::User},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of license key characters kept in fallback owner ids
const LICENSE_OWNER_PREFIX_LEN: usize = 16;

/// Sync response
#[derive(Debug, Serialize, Deserialize)]
pub struct SyncResponse {
    pub scan_id: Uuid,
    pub message: String,

    /// Where the scan can be viewed
    pub dashboard_url: String,
}

/// Connectivity check response
#[derive(Debug, Serialize, Deserialize)]
pub struct SyncStatusResponse {
    pub status: String,
    pub message: String,
    pub version: String,
}

/// Owner id used for license keys that map to no dashboard user
pub fn license_owner_id(license_key: &str) -> String {
    let prefix: String = license_key.chars().take(LICENSE_OWNER_PREFIX_LEN).collect();
    format!("license:{}", prefix)
}

/// Resolves the owner of an upload
///
/// # Errors
///
/// - `401` for missing credentials, unknown keys or an invalid license
/// - `502` when the license server cannot be reached
async fn resolve_owner(state: &AppState, headers: &HeaderMap) -> ApiResult<String> {
    let credentials = credentials(headers);

    match credentials.resolve_keys(&state.config.auth.internal_api_key)? {
        Some(Resolution::Authenticated(ctx)) => return Ok(ctx.user_id),
        Some(Resolution::PersonalKey(key)) => {
            return personal_key_context(state, key).await.map(|ctx| ctx.user_id)
        }
        Some(Resolution::SessionToken(_)) | None => {}
    }

    let header = credentials
        .authorization
        .ok_or(AuthError::MissingCredentials)?;
    let license_key = bearer_token(header)?;

    let validation = state.license.validate(license_key).await?;
    if !validation.valid {
        let reason = validation
            .message
            .unwrap_or_else(|| "Invalid license key".to_string());
        return Err(ApiError::Unauthorized(reason));
    }

    if let Some(email) = validation.email.as_deref() {
        if let Some(user) = User::find_by_email(&state.db, email).await? {
            return Ok(user.clerk_id);
        }
    }

    Ok(license_owner_id(license_key))
}

/// Stores a scan uploaded by the CLI
///
/// The owner is resolved before the body is read, so unauthenticated
/// uploads are refused with `401` whatever their payload.
///
/// # Errors
///
/// - `400 Bad Request`: Malformed JSON, unknown tool or status, invalid payload
/// - `401 Unauthorized`: No usable credentials or invalid license
/// - `502 Bad Gateway`: License server unreachable
pub async fn sync_scan(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<SyncResponse>> {
    let owner = resolve_owner(&state, &headers).await?;

    let payload: ScanPayload = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON: {}", e)))?;
    let data = payload.into_create_scan(None)?;
    let tool = data.tool;

    let scan = Scan::create(&state.db, &owner, data).await?;

    tracing::info!(scan_id = %scan.id, %tool, user_id = %owner, "Scan synced from CLI");

    Ok(Json(SyncResponse {
        scan_id: scan.id,
        message: "Scan synced successfully".to_string(),
        dashboard_url: format!("{}/{}/{}", state.config.api.dashboard_url, tool, scan.id),
    }))
}

/// Connectivity check used by the CLI before syncing
pub async fn sync_status() -> Json<SyncStatusResponse> {
    Json(SyncStatusResponse {
        status: "ok".to_string(),
        message: "Sync endpoint is available".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
