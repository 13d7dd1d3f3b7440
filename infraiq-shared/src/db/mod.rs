/// Database layer
///
/// # Modules
///
/// - `pool`: PostgreSQL connection pool with health checks
/// - `migrations`: Embedded migration runner
///
/// Models and their queries live in the `models` module at the crate root.

pub mod migrations;
pub mod pool;
