/// Database models for the InfraIQ dashboard
///
/// Each model owns its SQL: rows are mapped with `sqlx::FromRow` and queries
/// are plain parameterized statements.
///
/// # Models
///
/// - `user`: Dashboard users mirrored from Clerk, with tier and trial
/// - `project`: Named groupings of scans
/// - `scan`: Results uploaded by the InfraIQ CLI

pub mod project;
pub mod scan;
pub mod user;
