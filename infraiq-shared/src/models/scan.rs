/// Scan model and database operations
///
/// A scan is the result of one CLI run of an InfraIQ tool. Scans are written
/// once (by `POST /api/sync` or `POST /api/scans`) and afterwards only read or
/// deleted. The summary and the findings are stored as JSONB.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE scans (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id VARCHAR(255) NOT NULL,
///     tool VARCHAR(20) NOT NULL,
///     provider VARCHAR(255) NOT NULL,
///     region VARCHAR(255),
///     status VARCHAR(20) NOT NULL DEFAULT 'completed',
///     summary JSONB NOT NULL DEFAULT '{}',
///     findings JSONB NOT NULL DEFAULT '[]',
///     project_id UUID REFERENCES projects(id) ON DELETE SET NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use infraiq_shared::models::scan::{CreateScan, Scan, ScanFilter, ScanStatus, ScanSummary, ToolType};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let scan = Scan::create(
///     &pool,
///     "user_2abc",
///     CreateScan {
///         tool: ToolType::Verify,
///         provider: "aws".to_string(),
///         region: Some("us-east-1".to_string()),
///         status: ScanStatus::Completed,
///         summary: ScanSummary { resources_scanned: 42, ..Default::default() },
///         findings: vec![],
///         project_id: None,
///         scanned_at: None,
///     },
/// )
/// .await?;
///
/// let filter = ScanFilter { tool: Some(ToolType::Verify), ..Default::default() };
/// let total = Scan::count(&pool, "user_2abc", &filter).await?;
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

/// InfraIQ tools that upload scans
///
/// The declaration order is the order used for dashboard recommendations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolType {
    Verify,
    Migrate,
    Codify,
    Comply,
    Dataiq,
    Secureiq,
    Tessera,
}

impl ToolType {
    /// Every tool, in declaration order
    pub const ALL: [ToolType; 7] = [
        ToolType::Verify,
        ToolType::Migrate,
        ToolType::Codify,
        ToolType::Comply,
        ToolType::Dataiq,
        ToolType::Secureiq,
        ToolType::Tessera,
    ];

    /// Converts tool to string for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolType::Verify => "verify",
            ToolType::Migrate => "migrate",
            ToolType::Codify => "codify",
            ToolType::Comply => "comply",
            ToolType::Dataiq => "dataiq",
            ToolType::Secureiq => "secureiq",
            ToolType::Tessera => "tessera",
        }
    }

    /// Parses tool from string
    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.as_str() == s)
    }
}

impl std::fmt::Display for ToolType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a scan as reported by the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    InProgress,
    Completed,
    Failed,
}

impl ScanStatus {
    /// Converts status to string for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::InProgress => "in_progress",
            ScanStatus::Completed => "completed",
            ScanStatus::Failed => "failed",
        }
    }

    /// Parses status from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "in_progress" => Some(ScanStatus::InProgress),
            "completed" => Some(ScanStatus::Completed),
            "failed" => Some(ScanStatus::Failed),
            _ => None,
        }
    }
}

/// Aggregate counts of a scan
///
/// Missing fields deserialize to 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSummary {
    pub resources_scanned: u32,
    pub issues_found: u32,
    pub critical: u32,
    pub high: u32,
    pub medium: u32,
    pub low: u32,
}

/// One issue detected by a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,
    pub resource_type: String,
    pub resource_id: String,
    pub issue: String,
    pub severity: String,
    pub remediation: String,
}

/// Stored scan
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Scan {
    /// Unique scan ID (UUID v4)
    pub id: Uuid,

    /// Owner principal id (not a foreign key)
    pub user_id: String,

    /// Tool that produced the scan, see [`ToolType`]
    pub tool: String,

    /// Cloud provider that was scanned
    pub provider: String,

    /// Optional cloud region
    pub region: Option<String>,

    /// Scan status, see [`ScanStatus`]
    pub status: String,

    /// Aggregate counts (JSONB)
    pub summary: Json<ScanSummary>,

    /// Individual findings (JSONB)
    pub findings: Json<Vec<Finding>>,

    /// Project the scan belongs to, if any
    pub project_id: Option<Uuid>,

    /// When the scan was recorded
    pub created_at: DateTime<Utc>,

    /// When the row was last written
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a scan
#[derive(Debug, Clone)]
pub struct CreateScan {
    pub tool: ToolType,
    pub provider: String,
    pub region: Option<String>,
    pub status: ScanStatus,
    pub summary: ScanSummary,
    pub findings: Vec<Finding>,
    pub project_id: Option<Uuid>,

    /// When the CLI ran the scan; defaults to the insert time
    pub scanned_at: Option<DateTime<Utc>>,
}

/// Filters and paging for scan listings
#[derive(Debug, Clone)]
pub struct ScanFilter {
    pub tool: Option<ToolType>,
    pub project_id: Option<Uuid>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for ScanFilter {
    fn default() -> Self {
        Self {
            tool: None,
            project_id: None,
            limit: 20,
            offset: 0,
        }
    }
}

impl ScanFilter {
    /// Appends the WHERE clause shared by `list` and `count`
    ///
    /// `$1` is always the owner; returns the last bind index used.
    fn push_conditions(&self, query: &mut String) -> usize {
        let mut bind_count = 1;
        query.push_str(" WHERE user_id = $1");

        if self.tool.is_some() {
            bind_count += 1;
            query.push_str(&format!(" AND tool = ${}", bind_count));
        }
        if self.project_id.is_some() {
            bind_count += 1;
            query.push_str(&format!(" AND project_id = ${}", bind_count));
        }

        bind_count
    }
}

const SCAN_COLUMNS: &str = "id, user_id, tool, provider, region, status, summary, findings, \
     project_id, created_at, updated_at";

impl Scan {
    /// Gets the parsed tool enum
    pub fn get_tool(&self) -> Option<ToolType> {
        ToolType::from_str(&self.tool)
    }

    /// Gets the parsed status enum
    pub fn get_status(&self) -> Option<ScanStatus> {
        ScanStatus::from_str(&self.status)
    }

    /// Stores a new scan for `user_id`
    pub async fn create(
        pool: &PgPool,
        user_id: &str,
        data: CreateScan,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO scans (user_id, tool, provider, region, status, summary, findings,
                               project_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, COALESCE($9, NOW()))
            RETURNING {SCAN_COLUMNS}
            "#
        );

        let scan = sqlx::query_as::<_, Scan>(&query)
            .bind(user_id)
            .bind(data.tool.as_str())
            .bind(data.provider)
            .bind(data.region)
            .bind(data.status.as_str())
            .bind(Json(data.summary))
            .bind(Json(data.findings))
            .bind(data.project_id)
            .bind(data.scanned_at)
            .fetch_one(pool)
            .await?;

        Ok(scan)
    }

    /// Lists the owner's scans matching `filter`, newest first
    pub async fn list(
        pool: &PgPool,
        user_id: &str,
        filter: &ScanFilter,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut query = format!("SELECT {SCAN_COLUMNS} FROM scans");
        let bind_count = filter.push_conditions(&mut query);
        query.push_str(&format!(
            " ORDER BY created_at DESC LIMIT ${} OFFSET ${}",
            bind_count + 1,
            bind_count + 2
        ));

        let mut q = sqlx::query_as::<_, Scan>(&query).bind(user_id);

        if let Some(tool) = filter.tool {
            q = q.bind(tool.as_str());
        }
        if let Some(project_id) = filter.project_id {
            q = q.bind(project_id);
        }

        q.bind(filter.limit).bind(filter.offset).fetch_all(pool).await
    }

    /// Counts the owner's scans matching `filter`, ignoring paging
    pub async fn count(
        pool: &PgPool,
        user_id: &str,
        filter: &ScanFilter,
    ) -> Result<i64, sqlx::Error> {
        let mut query = String::from("SELECT COUNT(*) FROM scans");
        filter.push_conditions(&mut query);

        let mut q = sqlx::query_scalar::<_, i64>(&query).bind(user_id);

        if let Some(tool) = filter.tool {
            q = q.bind(tool.as_str());
        }
        if let Some(project_id) = filter.project_id {
            q = q.bind(project_id);
        }

        q.fetch_one(pool).await
    }

    /// Finds a scan if it exists and is owned by `user_id`
    pub async fn find_for_owner(
        pool: &PgPool,
        id: Uuid,
        user_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {SCAN_COLUMNS} FROM scans WHERE id = $1 AND user_id = $2");

        sqlx::query_as::<_, Scan>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Deletes an owned scan
    ///
    /// # Returns
    ///
    /// True if the scan was deleted, false if missing or not owned
    pub async fn delete(pool: &PgPool, id: Uuid, user_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM scans WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// The owner's scans recorded at or after `since`, newest first
    pub async fn list_since(
        pool: &PgPool,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {SCAN_COLUMNS} FROM scans \
             WHERE user_id = $1 AND created_at >= $2 \
             ORDER BY created_at DESC"
        );

        sqlx::query_as::<_, Scan>(&query)
            .bind(user_id)
            .bind(since)
            .fetch_all(pool)
            .await
    }

    /// The newest scan of each tool the owner has used
    pub async fn latest_per_tool(pool: &PgPool, user_id: &str) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT DISTINCT ON (tool) {SCAN_COLUMNS} FROM scans \
             WHERE user_id = $1 \
             ORDER BY tool, created_at DESC"
        );

        sqlx::query_as::<_, Scan>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }
}
