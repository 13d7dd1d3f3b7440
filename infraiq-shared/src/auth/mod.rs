/// Authentication utilities
///
/// # Modules
///
/// - [`api_key`]: Personal key generation and internal key checks
/// - [`context`]: Request principal and credential precedence
/// - [`jwt`]: Clerk session token verification against a JWK set
///
/// # Security Features
///
/// - **Personal keys**: 256 bits of randomness behind an `iq_` prefix
/// - **Internal keys**: Constant-time comparison, empty keys never match
/// - **Session tokens**: RS256 signatures checked against Clerk's published keys

pub mod api_key;
pub mod context;
pub mod jwt;
