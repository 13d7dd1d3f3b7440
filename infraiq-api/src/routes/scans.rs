/// Scan endpoints
///
/// All endpoints require authentication and only ever see the caller's own
/// scans; a scan owned by someone else is reported as not found.
///
/// # Endpoints
///
/// - `GET /api/scans?tool=&project_id=&limit=&offset=` - List scans, newest first
/// - `POST /api/scans` - Create a scan from the dashboard
/// - `GET /api/scans/:id` - Get one scan
/// - `DELETE /api/scans/:id` - Delete one scan

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extractors::{Json, Path, Query},
};
use axum::{extract::State, http::StatusCode, Extension};
use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use infraiq_shared::{
    auth::context::AuthContext,
    models::{
        project::Project,
        scan::{CreateScan, Finding, Scan, ScanFilter, ScanStatus, ScanSummary, ToolType},
    },
};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Largest page size accepted by the listing
pub const MAX_PAGE_SIZE: i64 = 100;

/// Scan results as sent by the CLI and the dashboard
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ScanPayload {
    /// Tool name, e.g. `verify`
    pub tool: String,

    #[validate(length(min = 1, max = 255, message = "Provider must be 1-255 characters"))]
    pub provider: String,

    #[validate(length(max = 255, message = "Region must be at most 255 characters"))]
    pub region: Option<String>,

    /// `in_progress`, `completed` or `failed`
    #[serde(default = "default_status")]
    pub status: String,

    #[serde(default)]
    pub summary: ScanSummary,

    #[serde(default)]
    pub findings: Vec<Finding>,

    /// When the scan ran; defaults to the upload time
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// RFC 3339 timestamp, or an ISO timestamp without offset
#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Offset(DateTime<FixedOffset>),
    Naive(NaiveDateTime),
}

/// Reads a scan timestamp, taking offset-less values as UTC
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawTimestamp>::deserialize(deserializer)?;

    Ok(raw.map(|timestamp| match timestamp {
        RawTimestamp::Offset(dt) => dt.with_timezone(&Utc),
        RawTimestamp::Naive(naive) => naive.and_utc(),
    }))
}

fn default_status() -> String {
    ScanStatus::Completed.as_str().to_string()
}

impl ScanPayload {
    /// Validates the payload and turns it into a scan insert
    ///
    /// # Errors
    ///
    /// `400` for field violations and unknown tool or status names.
    pub fn into_create_scan(self, project_id: Option<Uuid>) -> ApiResult<CreateScan> {
        self.validate()?;

        let tool = parse_tool(&self.tool)?;
        let status = ScanStatus::from_str(&self.status)
            .ok_or_else(|| ApiError::BadRequest(format!("Invalid status: {}", self.status)))?;

        Ok(CreateScan {
            tool,
            provider: self.provider,
            region: self.region,
            status,
            summary: self.summary,
            findings: self.findings,
            project_id,
            scanned_at: self.timestamp,
        })
    }
}

/// Parses a tool name, rejecting unknown tools with `400`
pub fn parse_tool(tool: &str) -> ApiResult<ToolType> {
    ToolType::from_str(tool).ok_or_else(|| ApiError::BadRequest(format!("Invalid tool: {}", tool)))
}

/// Create scan request
#[derive(Debug, Deserialize)]
pub struct CreateScanRequest {
    #[serde(flatten)]
    pub scan: ScanPayload,

    /// Project to attach the scan to; must be owned by the caller
    pub project_id: Option<Uuid>,
}

/// Listing query parameters
#[derive(Debug, Default, Deserialize)]
pub struct ListScansQuery {
    pub tool: Option<String>,
    pub project_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListScansQuery {
    /// Checks paging bounds and builds the filter
    pub fn into_filter(self) -> ApiResult<ScanFilter> {
        let defaults = ScanFilter::default();
        let limit = self.limit.unwrap_or(defaults.limit);
        let offset = self.offset.unwrap_or(defaults.offset);

        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            return Err(ApiError::BadRequest(format!(
                "limit must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }
        if offset < 0 {
            return Err(ApiError::BadRequest("offset must not be negative".to_string()));
        }

        let tool = self.tool.as_deref().map(parse_tool).transpose()?;

        Ok(ScanFilter {
            tool,
            project_id: self.project_id,
            limit,
            offset,
        })
    }
}

/// List scans response
#[derive(Debug, Serialize)]
pub struct ScanListResponse {
    pub scans: Vec<Scan>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Message-only response
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Lists the caller's scans, newest first
///
/// # Errors
///
/// - `400 Bad Request`: Unknown tool or paging out of range
/// - `401 Unauthorized`: Missing or invalid credentials
pub async fn list_scans(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListScansQuery>,
) -> ApiResult<Json<ScanListResponse>> {
    let filter = query.into_filter()?;

    let scans = Scan::list(&state.db, &auth.user_id, &filter).await?;
    let total = Scan::count(&state.db, &auth.user_id, &filter).await?;

    Ok(Json(ScanListResponse {
        scans,
        total,
        limit: filter.limit,
        offset: filter.offset,
    }))
}

/// Creates a scan for the caller
///
/// # Errors
///
/// - `400 Bad Request`: Invalid payload
/// - `404 Not Found`: `project_id` is not one of the caller's projects
pub async fn create_scan(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateScanRequest>,
) -> ApiResult<(StatusCode, Json<Scan>)> {
    let data = req.scan.into_create_scan(req.project_id)?;

    if let Some(project_id) = data.project_id {
        Project::find_for_owner(&state.db, project_id, &auth.user_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Project not found".to_string()))?;
    }

    let scan = Scan::create(&state.db, &auth.user_id, data).await?;

    tracing::info!(scan_id = %scan.id, tool = %scan.tool, user_id = %auth.user_id, "Scan created");

    Ok((StatusCode::CREATED, Json(scan)))
}

/// Gets one of the caller's scans
pub async fn get_scan(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Scan>> {
    Scan::find_for_owner(&state.db, id, &auth.user_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Scan not found".to_string()))
}

/// Deletes one of the caller's scans
pub async fn delete_scan(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    if !Scan::delete(&state.db, id, &auth.user_id).await? {
        return Err(ApiError::NotFound("Scan not found".to_string()));
    }

    tracing::info!(scan_id = %id, user_id = %auth.user_id, "Scan deleted");

    Ok(Json(MessageResponse {
        message: "Scan deleted".to_string(),
    }))
}
