/// Current user endpoints
///
/// Called by the dashboard right after Clerk sign-in. Users may only act for
/// their own Clerk id; the internal dashboard key may act for anyone.
///
/// # Endpoints
///
/// - `POST /api/users/me` - Create (with a 30-day trial) or refresh the user
/// - `GET /api/users/me?clerk_id=` - Get the user

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extractors::{Json, Query},
};
use axum::{extract::State, Extension};
use chrono::{DateTime, Utc};
use infraiq_shared::{
    auth::{api_key::generate_api_key, context::AuthContext},
    models::user::{CreateUser, User},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Sign-in callback request
#[derive(Debug, Deserialize, Validate)]
pub struct UserMeRequest {
    #[validate(length(min = 1, max = 255, message = "clerk_id is required"))]
    pub clerk_id: String,

    #[validate(email(message = "Invalid email address"))]
    pub email: String,

    #[validate(length(max = 255, message = "Name must be at most 255 characters"))]
    pub name: Option<String>,
}

/// Query of `GET /api/users/me`
#[derive(Debug, Deserialize)]
pub struct UserMeQuery {
    /// Defaults to the caller
    pub clerk_id: Option<String>,
}

/// User with computed trial fields
#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub clerk_id: String,
    pub email: String,
    pub name: Option<String>,
    pub api_key: Option<String>,
    pub tier: String,
    pub trial_started_at: Option<DateTime<Utc>>,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub trial_days_remaining: i64,
    pub is_trial_active: bool,
    pub created_at: DateTime<Utc>,
}

impl UserResponse {
    pub fn from_user(user: User, now: DateTime<Utc>) -> Self {
        Self {
            trial_days_remaining: user.trial_days_remaining_at(now),
            is_trial_active: user.is_trial_active_at(now),
            id: user.id,
            clerk_id: user.clerk_id,
            email: user.email,
            name: user.name,
            api_key: user.api_key,
            tier: user.tier,
            trial_started_at: user.trial_started_at,
            trial_ends_at: user.trial_ends_at,
            created_at: user.created_at,
        }
    }
}

/// Creates or refreshes the signed-in user
///
/// New users start a 30-day trial and receive a personal API key. Existing
/// users keep tier, trial dates and API key; only email and name change.
///
/// # Errors
///
/// - `400 Bad Request`: Invalid email or missing clerk_id
/// - `403 Forbidden`: Acting for another user
/// - `409 Conflict`: Email belongs to another account
pub async fn upsert_current_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<UserMeRequest>,
) -> ApiResult<Json<UserResponse>> {
    req.validate()?;
    auth.ensure_acting_for(&req.clerk_id)?;

    let now = Utc::now();
    let user = User::upsert(
        &state.db,
        CreateUser {
            clerk_id: req.clerk_id,
            email: req.email,
            name: req.name,
            api_key: generate_api_key(),
        },
        now,
    )
    .await?;

    tracing::info!(clerk_id = %user.clerk_id, tier = %user.tier, "User signed in");

    Ok(Json(UserResponse::from_user(user, now)))
}

/// Gets a user by Clerk id
pub async fn get_current_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<UserMeQuery>,
) -> ApiResult<Json<UserResponse>> {
    let clerk_id = query.clerk_id.unwrap_or_else(|| auth.user_id.clone());
    auth.ensure_acting_for(&clerk_id)?;

    let user = User::find_by_clerk_id(&state.db, &clerk_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(UserResponse::from_user(user, Utc::now())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn user(tier: &str, trial_ends_at: Option<DateTime<Utc>>) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            clerk_id: "user_1".to_string(),
            email: "ada@example.com".to_string(),
            name: None,
            api_key: Some("iq_key".to_string()),
            tier: tier.to_string(),
            trial_started_at: trial_ends_at.map(|_| now),
            trial_ends_at,
            stripe_customer_id: None,
            stripe_subscription_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_response_trial_fields() {
        let now = Utc::now();
        let response = UserResponse::from_user(
            user("trial", Some(now + Duration::days(10) + Duration::hours(1))),
            now,
        );
        assert_eq!(response.trial_days_remaining, 10);
        assert!(response.is_trial_active);

        let response = UserResponse::from_user(user("pro", None), now);
        assert_eq!(response.trial_days_remaining, 0);
        assert!(!response.is_trial_active);
    }

    #[test]
    fn test_request_validation() {
        let req: UserMeRequest =
            serde_json::from_value(json!({"clerk_id": "user_1", "email": "not-an-email"})).unwrap();
        assert!(req.validate().is_err());

        let req: UserMeRequest =
            serde_json::from_value(json!({"clerk_id": "", "email": "ada@example.com"})).unwrap();
        assert!(req.validate().is_err());

        let req: UserMeRequest = serde_json::from_value(
            json!({"clerk_id": "user_1", "email": "ada@example.com", "name": "Ada"}),
        )
        .unwrap();
        assert!(req.validate().is_ok());
    }
}
