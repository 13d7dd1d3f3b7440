//! # InfraIQ API Server
//!
//! Backend of the InfraIQ dashboard: stores scan results uploaded by the CLI
//! and the dashboard, manages projects and users, and keeps subscription
//! tiers in sync with Clerk, Stripe and the license server.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p infraiq-api
//! ```

use infraiq_api::{
    app::{build_router, AppState},
    config::Config,
};
use infraiq_shared::db::{
    migrations::run_migrations,
    pool::{close_pool, create_pool, DatabaseConfig},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "infraiq_api=debug,infraiq_shared=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("InfraIQ API Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    tracing::info!(environment = %config.api.environment, "Configuration loaded");

    let pool = create_pool(DatabaseConfig {
        url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        ..DatabaseConfig::default()
    })
    .await?;

    run_migrations(&pool).await?;

    let bind_address = config.bind_address();
    let state = AppState::new(pool.clone(), config)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    close_pool(pool).await;
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received, draining connections...");
}
