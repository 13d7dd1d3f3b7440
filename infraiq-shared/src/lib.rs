//! # InfraIQ Shared Library
//!
//! Domain types, database access and upstream clients used by the InfraIQ
//! dashboard API.
//!
//! ## Module Organization
//!
//! - `db`: Connection pool and migrations
//! - `models`: Users, projects and scans with their SQL
//! - `auth`: API keys, credential precedence and Clerk session tokens
//! - `integrations`: Stripe, Clerk and license server clients
//! - `webhooks`: Stripe and Svix signature verification
//! - `scoring`: Dashboard statistics and recommendations

pub mod auth;
pub mod db;
pub mod integrations;
pub mod models;
pub mod scoring;
pub mod webhooks;

/// Current version of the InfraIQ shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
