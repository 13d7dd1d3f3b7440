/// Dashboard overview endpoints
///
/// - `GET /api/dashboard/stats` - Aggregates over the caller's last 7 days of scans
/// - `GET /api/dashboard/recommendations` - Suggestions from the latest scan of each tool
///
/// The arithmetic lives in [`infraiq_shared::scoring`]; these handlers only
/// load the scans.

use crate::{app::AppState, error::ApiResult, extractors::Json};
use axum::{extract::State, Extension};
use chrono::{Duration, Utc};
use infraiq_shared::{
    auth::context::AuthContext,
    models::scan::Scan,
    scoring::{build_recommendations, DashboardStats, Recommendation},
};

/// Length of the statistics window
const STATS_WINDOW_DAYS: i64 = 7;

/// Statistics over the caller's recent scans
pub async fn get_stats(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<DashboardStats>> {
    let since = Utc::now() - Duration::days(STATS_WINDOW_DAYS);
    let scans = Scan::list_since(&state.db, &auth.user_id, since).await?;

    Ok(Json(DashboardStats::from_scans(&scans)))
}

/// Recommendations from the caller's latest scan of each tool
pub async fn get_recommendations(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<Recommendation>>> {
    let latest = Scan::latest_per_tool(&state.db, &auth.user_id).await?;

    Ok(Json(build_recommendations(&latest)))
}
