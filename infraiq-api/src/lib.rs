//! # InfraIQ API Server Library
//!
//! HTTP layer of the InfraIQ dashboard backend. Persistence, authentication
//! primitives and upstream clients live in `infraiq-shared`.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `extractors`: Request extractors that reject with [`error::ApiError`]
//! - `middleware`: Authentication and security headers
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod routes;
