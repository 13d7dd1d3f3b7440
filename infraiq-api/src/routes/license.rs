/// License endpoints
///
/// Two audiences use this router:
///
/// - The license server, authenticated with the internal service key, pushes
///   tier changes (`POST /license-update`) and looks users up
///   (`GET /license-status`).
/// - Dashboard users read their own license (`GET /status`), validate keys
///   (`POST /validate`) and pull their license from the license server
///   (`POST /sync`).
///
/// License keys themselves are never stored; only the resulting tier is.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extractors::{Json, Query},
};
use axum::{extract::State, Extension};
use chrono::{DateTime, Utc};
use infraiq_shared::{
    auth::context::AuthContext,
    models::{
        scan::ToolType,
        user::{Tier, User},
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Push from the license server after a purchase or renewal
#[derive(Debug, Deserialize, Validate)]
pub struct LicenseUpdateRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,

    pub license_key: String,

    /// `pro`, `team` or `enterprise`
    pub tier: String,

    pub expires_at: Option<String>,
}

/// Outcome of a license push
#[derive(Debug, Serialize, Deserialize)]
pub struct LicenseUpdateResponse {
    /// `updated`, or `pending` when no user has the email yet
    pub status: String,

    pub email: String,
    pub tier: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_tier: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Query of `GET /license-status`
#[derive(Debug, Deserialize)]
pub struct LicenseStatusQuery {
    pub email: String,
}

/// License of a user as seen by the license server
#[derive(Debug, Serialize, Deserialize)]
pub struct LicenseStatusResponse {
    pub email: String,
    pub tier: String,

    /// Always null, keys are not stored here
    pub license_key: Option<String>,

    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

/// License of the calling user as shown by the dashboard
#[derive(Debug, Serialize, Deserialize)]
pub struct CallerLicenseStatus {
    pub tier: String,

    /// `active` or `expired`
    pub status: String,

    pub tools_enabled: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub trial_days_remaining: Option<i64>,

    pub valid_until: Option<DateTime<Utc>>,
}

impl CallerLicenseStatus {
    pub fn from_user(user: &User, now: DateTime<Utc>) -> Self {
        let active = user.has_active_license_at(now);
        let on_trial = user.get_tier() == Some(Tier::Trial);

        let tools_enabled = if active {
            ToolType::ALL.iter().map(ToString::to_string).collect()
        } else {
            Vec::new()
        };

        Self {
            tier: user.tier.clone(),
            status: if active { "active" } else { "expired" }.to_string(),
            tools_enabled,
            trial_days_remaining: on_trial.then(|| user.trial_days_remaining_at(now)),
            valid_until: if on_trial { user.trial_ends_at } else { None },
        }
    }
}

/// License key validation request
#[derive(Debug, Deserialize, Validate)]
pub struct ValidateLicenseRequest {
    #[validate(length(min = 1, message = "License key is required"))]
    pub key: String,
}

/// License key validation result
#[derive(Debug, Serialize, Deserialize)]
pub struct ValidateLicenseResponse {
    pub valid: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

fn parse_tier(tier: &str) -> ApiResult<Tier> {
    Tier::from_str(&tier.trim().to_lowercase())
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid tier: {}", tier)))
}

/// Applies a tier pushed by the license server
///
/// # Errors
///
/// - `400 Bad Request`: Unknown tier or invalid email
/// - `401 Unauthorized`: Missing or wrong service key
pub async fn license_update(
    State(state): State<AppState>,
    Json(req): Json<LicenseUpdateRequest>,
) -> ApiResult<Json<LicenseUpdateResponse>> {
    req.validate()?;
    let tier = parse_tier(&req.tier)?;
    let email = req.email.trim().to_lowercase();

    let Some(user) = User::find_by_email(&state.db, &email).await? else {
        tracing::info!(%email, %tier, "License update for unknown user");
        return Ok(Json(LicenseUpdateResponse {
            status: "pending".to_string(),
            email,
            tier: tier.to_string(),
            previous_tier: None,
            user_id: None,
            message: Some("User not found - will be updated on first sign-in".to_string()),
        }));
    };

    let updated = User::set_tier(&state.db, user.id, tier).await?;

    tracing::info!(
        %email,
        previous_tier = %user.tier,
        %tier,
        expires_at = ?req.expires_at,
        "License update applied"
    );

    Ok(Json(LicenseUpdateResponse {
        status: "updated".to_string(),
        email,
        tier: updated.tier,
        previous_tier: Some(user.tier),
        user_id: Some(updated.id),
        message: None,
    }))
}

/// Looks up the license of a user by email
pub async fn license_status(
    State(state): State<AppState>,
    Query(query): Query<LicenseStatusQuery>,
) -> ApiResult<Json<LicenseStatusResponse>> {
    let user = User::find_by_email(&state.db, &query.email)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let is_active = user.has_active_license_at(Utc::now());

    Ok(Json(LicenseStatusResponse {
        email: user.email,
        tier: user.tier,
        license_key: None,
        expires_at: user.trial_ends_at,
        is_active,
    }))
}

/// License status of the caller
pub async fn get_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<CallerLicenseStatus>> {
    let user = caller(&state, &auth).await?;
    Ok(Json(CallerLicenseStatus::from_user(&user, Utc::now())))
}

/// Validates a license key against the license server
///
/// # Errors
///
/// - `502 Bad Gateway`: License server unreachable or failing
pub async fn validate_license(
    State(state): State<AppState>,
    Json(req): Json<ValidateLicenseRequest>,
) -> ApiResult<Json<ValidateLicenseResponse>> {
    req.validate()?;

    let validation = state.license.validate(req.key.trim()).await?;

    Ok(Json(ValidateLicenseResponse {
        valid: validation.valid,
        tier: validation.tier,
        message: validation.message,
    }))
}

/// Pulls the caller's license from the license server
///
/// An active paid license found for the caller's email becomes the caller's
/// tier. Nothing changes otherwise.
pub async fn sync_license(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<CallerLicenseStatus>> {
    let mut user = caller(&state, &auth).await?;

    let remote = state.license.status(&user.email).await?;

    let paid_tier = remote
        .filter(|license| license.active)
        .and_then(|license| Tier::from_str(&license.tier.to_lowercase()))
        .filter(Tier::is_paid);

    match paid_tier {
        Some(tier) if user.get_tier() != Some(tier) => {
            tracing::info!(clerk_id = %user.clerk_id, previous_tier = %user.tier, %tier, "License synced");
            user = User::set_tier(&state.db, user.id, tier).await?;
        }
        Some(_) => {}
        None => tracing::debug!(clerk_id = %user.clerk_id, "No active license on the license server"),
    }

    Ok(Json(CallerLicenseStatus::from_user(&user, Utc::now())))
}

async fn caller(state: &AppState, auth: &AuthContext) -> ApiResult<User> {
    User::find_by_clerk_id(&state.db, &auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}
