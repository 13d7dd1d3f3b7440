/// Dashboard aggregation
///
/// Turns a user's recent scans into the numbers shown on the dashboard home
/// page and into a short list of recommended actions. Everything here is pure;
/// the route handlers load the scans and serialize the result.
///
/// # Security score
///
/// `score = clamp(0, 100, round((1 - issues / resources) * 100))`, or 100 when
/// nothing was scanned. Grades: `A` from 90, `B+` from 80, `B` from 70, `C`
/// from 60, `D` below.

use serde::{Deserialize, Serialize};

use crate::models::scan::{Scan, ScanStatus, ToolType};

/// Maximum number of recommendations returned
pub const MAX_RECOMMENDATIONS: usize = 5;

/// Compliance framework reported for comply scans
pub const COMPLIANCE_FRAMEWORK: &str = "SOC2";

/// Security score in `0..=100`
pub fn security_score(resources: u64, issues: u64) -> u8 {
    if resources == 0 {
        return 100;
    }

    let ratio = issues as f64 / resources as f64;
    ((1.0 - ratio) * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Letter grade of a security score
pub fn security_grade(score: u8) -> &'static str {
    match score {
        90.. => "A",
        80..=89 => "B+",
        70..=79 => "B",
        60..=69 => "C",
        _ => "D",
    }
}

/// Compliance state of one framework
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceStatus {
    pub framework: String,

    /// `compliant`, `partial` or `non_compliant`
    pub status: String,
}

impl ComplianceStatus {
    /// Derives the compliance state from a comply scan
    pub fn from_scan(scan: &Scan) -> Self {
        let summary = &scan.summary.0;
        let status = if summary.critical > 0 {
            "non_compliant"
        } else if summary.issues_found > 0 {
            "partial"
        } else {
            "compliant"
        };

        Self {
            framework: COMPLIANCE_FRAMEWORK.to_string(),
            status: status.to_string(),
        }
    }
}

/// Aggregated dashboard numbers over a window of scans
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub resources_monitored: u64,
    pub security_score: u8,
    pub security_grade: String,
    pub compliance_status: Vec<ComplianceStatus>,
    pub active_migrations: u64,
    pub scans_this_week: u64,
    pub issues_resolved: u64,
}

impl DashboardStats {
    /// Aggregates the scans of the reporting window
    pub fn from_scans(scans: &[Scan]) -> Self {
        let mut resources: u64 = 0;
        let mut issues: u64 = 0;
        let mut active_migrations = 0;

        for scan in scans {
            let summary = &scan.summary.0;
            resources += u64::from(summary.resources_scanned);
            issues += u64::from(summary.issues_found);

            if scan.get_tool() == Some(ToolType::Migrate)
                && scan.get_status() == Some(ScanStatus::InProgress)
            {
                active_migrations += 1;
            }
        }

        let compliance_status = scans
            .iter()
            .filter(|scan| scan.get_tool() == Some(ToolType::Comply))
            .max_by_key(|scan| scan.created_at)
            .map(ComplianceStatus::from_scan)
            .into_iter()
            .collect();

        let score = security_score(resources, issues);

        Self {
            resources_monitored: resources,
            security_score: score,
            security_grade: security_grade(score).to_string(),
            compliance_status,
            active_migrations,
            scans_this_week: scans.len() as u64,
            // Resolution of findings is not tracked
            issues_resolved: 0,
        }
    }
}

/// A suggested next step for the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: String,

    #[serde(rename = "type")]
    pub kind: String,

    pub title: String,
    pub description: String,
    pub severity: String,
    pub tool: String,
    pub action_url: String,
}

impl Recommendation {
    fn critical_issues(scan: &Scan, tool: ToolType) -> Self {
        Self {
            id: format!("critical-{}", scan.id),
            kind: "security".to_string(),
            title: format!("{} critical issues in {}", scan.summary.0.critical, tool),
            description: "These issues need immediate attention".to_string(),
            severity: "critical".to_string(),
            tool: tool.to_string(),
            action_url: format!("/{}/{}", tool, scan.id),
        }
    }

    fn run_security_scan() -> Self {
        Self {
            id: "run-verify".to_string(),
            kind: "security".to_string(),
            title: "Run a security scan".to_string(),
            description: "Keep your infrastructure secure with regular scans".to_string(),
            severity: "low".to_string(),
            tool: ToolType::Verify.to_string(),
            action_url: "/verify".to_string(),
        }
    }
}

/// Builds recommendations from the latest scan of each tool
///
/// `latest` may be in any order; recommendations follow the tool order of
/// [`ToolType::ALL`].
pub fn build_recommendations(latest: &[Scan]) -> Vec<Recommendation> {
    let mut recommendations: Vec<Recommendation> = ToolType::ALL
        .into_iter()
        .filter_map(|tool| {
            latest
                .iter()
                .filter(|scan| scan.get_tool() == Some(tool))
                .max_by_key(|scan| scan.created_at)
                .filter(|scan| scan.summary.0.critical > 0)
                .map(|scan| Recommendation::critical_issues(scan, tool))
        })
        .collect();

    if recommendations.is_empty() {
        recommendations.push(Recommendation::run_security_scan());
    }

    recommendations.truncate(MAX_RECOMMENDATIONS);
    recommendations
}
