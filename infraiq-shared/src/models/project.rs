/// Project model and database operations
///
/// A project groups related scans for one owner. Deleting a project detaches
/// its scans (`scans.project_id` is `ON DELETE SET NULL`), it never deletes
/// them.
///
/// All lookups are scoped by owner: a project that exists but belongs to
/// someone else is reported exactly like a missing one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Named grouping of scans
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    /// Unique project ID (UUID v4)
    pub id: Uuid,

    /// Owner principal id (not a foreign key)
    pub user_id: String,

    /// Display name, 1 to 255 characters
    pub name: String,

    /// Optional free-form description
    pub description: Option<String>,

    /// When the project was created
    pub created_at: DateTime<Utc>,

    /// When the project was last updated
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProject {
    pub name: String,
    pub description: Option<String>,
}

/// Input for updating a project
///
/// Only the provided fields change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl Project {
    /// Creates a project owned by `user_id`
    pub async fn create(
        pool: &PgPool,
        user_id: &str,
        data: CreateProject,
    ) -> Result<Self, sqlx::Error> {
        let project = sqlx::query_as::<_, Project>(
            r#"
            INSERT INTO projects (user_id, name, description)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, name, description, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(data.name)
        .bind(data.description)
        .fetch_one(pool)
        .await?;

        Ok(project)
    }

    /// Lists the owner's projects, newest first
    pub async fn list_by_owner(pool: &PgPool, user_id: &str) -> Result<Vec<Self>, sqlx::Error> {
        let projects = sqlx::query_as::<_, Project>(
            r#"
            SELECT id, user_id, name, description, created_at, updated_at
            FROM projects
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(projects)
    }

    /// Finds a project if it exists and is owned by `user_id`
    pub async fn find_for_owner(
        pool: &PgPool,
        id: Uuid,
        user_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let project = sqlx::query_as::<_, Project>(
            r#"
            SELECT id, user_id, name, description, created_at, updated_at
            FROM projects
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(project)
    }

    /// Applies a partial update to an owned project
    ///
    /// Returns `None` when the project is missing or not owned.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        user_id: &str,
        data: UpdateProject,
    ) -> Result<Option<Self>, sqlx::Error> {
        // Build dynamic update query based on which fields are present
        let mut query = String::from("UPDATE projects SET updated_at = NOW()");
        let mut bind_count = 2;

        if data.name.is_some() {
            bind_count += 1;
            query.push_str(&format!(", name = ${}", bind_count));
        }
        if data.description.is_some() {
            bind_count += 1;
            query.push_str(&format!(", description = ${}", bind_count));
        }

        query.push_str(
            " WHERE id = $1 AND user_id = $2 \
             RETURNING id, user_id, name, description, created_at, updated_at",
        );

        let mut q = sqlx::query_as::<_, Project>(&query).bind(id).bind(user_id);

        if let Some(name) = data.name {
            q = q.bind(name);
        }
        if let Some(description) = data.description {
            q = q.bind(description);
        }

        q.fetch_optional(pool).await
    }

    /// Deletes an owned project, detaching its scans
    ///
    /// # Returns
    ///
    /// True if the project was deleted, false if missing or not owned
    pub async fn delete(pool: &PgPool, id: Uuid, user_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// IDs of the scans linked to this project, newest first
    pub async fn scan_ids(&self, pool: &PgPool) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT id FROM scans
            WHERE project_id = $1 AND user_id = $2
            ORDER BY created_at DESC
            "#,
        )
        .bind(self.id)
        .bind(&self.user_id)
        .fetch_all(pool)
        .await
    }
}
