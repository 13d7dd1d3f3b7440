/// Project endpoints
///
/// Projects group scans. Every endpoint is scoped to the caller; deleting a
/// project detaches its scans instead of deleting them.
///
/// # Endpoints
///
/// - `GET /api/projects` - List projects with their scan ids
/// - `POST /api/projects` - Create a project
/// - `GET /api/projects/:id` - Get a project
/// - `PUT /api/projects/:id` - Update name and/or description
/// - `DELETE /api/projects/:id` - Delete a project

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extractors::{Json, Path},
    routes::scans::MessageResponse,
};
use axum::{extract::State, http::StatusCode, Extension};
use chrono::{DateTime, Utc};
use infraiq_shared::{
    auth::context::AuthContext,
    models::project::{CreateProject, Project, UpdateProject},
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

/// Create project request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateProjectRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,

    pub description: Option<String>,
}

/// Update project request; omitted fields are left unchanged
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProjectRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: Option<String>,

    pub description: Option<String>,
}

/// Project with the ids of its scans
#[derive(Debug, Serialize, Deserialize)]
pub struct ProjectResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,

    /// Ids of the scans attached to the project
    pub scans: Vec<Uuid>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProjectResponse {
    fn new(project: Project, scans: Vec<Uuid>) -> Self {
        Self {
            id: project.id,
            name: project.name,
            description: project.description,
            scans,
            created_at: project.created_at,
            updated_at: project.updated_at,
        }
    }

    async fn load(pool: &PgPool, project: Project) -> ApiResult<Self> {
        let scans = project.scan_ids(pool).await?;
        Ok(Self::new(project, scans))
    }
}

fn project_not_found() -> ApiError {
    ApiError::NotFound("Project not found".to_string())
}

/// Lists the caller's projects, newest first
pub async fn list_projects(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<ProjectResponse>>> {
    let projects = Project::list_by_owner(&state.db, &auth.user_id).await?;

    let mut response = Vec::with_capacity(projects.len());
    for project in projects {
        response.push(ProjectResponse::load(&state.db, project).await?);
    }

    Ok(Json(response))
}

/// Creates a project owned by the caller
///
/// # Errors
///
/// - `400 Bad Request`: Name missing or too long
pub async fn create_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateProjectRequest>,
) -> ApiResult<(StatusCode, Json<ProjectResponse>)> {
    req.validate()?;

    let project = Project::create(
        &state.db,
        &auth.user_id,
        CreateProject {
            name: req.name,
            description: req.description,
        },
    )
    .await?;

    tracing::info!(project_id = %project.id, user_id = %auth.user_id, "Project created");

    Ok((StatusCode::CREATED, Json(ProjectResponse::new(project, Vec::new()))))
}

/// Gets one of the caller's projects
pub async fn get_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ProjectResponse>> {
    let project = Project::find_for_owner(&state.db, id, &auth.user_id)
        .await?
        .ok_or_else(project_not_found)?;

    Ok(Json(ProjectResponse::load(&state.db, project).await?))
}

/// Updates one of the caller's projects
pub async fn update_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateProjectRequest>,
) -> ApiResult<Json<ProjectResponse>> {
    req.validate()?;

    let project = Project::update(
        &state.db,
        id,
        &auth.user_id,
        UpdateProject {
            name: req.name,
            description: req.description,
        },
    )
    .await?
    .ok_or_else(project_not_found)?;

    Ok(Json(ProjectResponse::load(&state.db, project).await?))
}

/// Deletes one of the caller's projects, detaching its scans
pub async fn delete_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    if !Project::delete(&state.db, id, &auth.user_id).await? {
        return Err(project_not_found());
    }

    tracing::info!(project_id = %id, user_id = %auth.user_id, "Project deleted");

    Ok(Json(MessageResponse {
        message: "Project deleted".to_string(),
    }))
}
