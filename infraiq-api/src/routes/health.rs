/// Health check endpoint
///
/// Reports whether the server is running and can reach the database.
/// Always answers 200 so load balancers can tell a degraded instance from a
/// dead one.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "environment": "production",
///   "database": "connected"
/// }
/// ```

use crate::{app::AppState, extractors::Json};
use axum::extract::State;
use infraiq_shared::db::pool::is_connected;
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy` or `degraded`
    pub status: String,

    /// Application version
    pub version: String,

    /// Deployment environment
    pub environment: String,

    /// `connected` or `disconnected`
    pub database: String,
}

/// Health check handler
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let connected = is_connected(&state.db).await;

    if !connected {
        tracing::warn!("Health check: database unreachable");
    }

    Json(HealthResponse {
        status: if connected { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: state.config.api.environment.clone(),
        database: if connected { "connected" } else { "disconnected" }.to_string(),
    })
}
