/// Middleware modules for the API server
///
/// - `auth`: Credential chain and internal service key checks
/// - `security`: Security response headers

pub mod auth;
pub mod security;
