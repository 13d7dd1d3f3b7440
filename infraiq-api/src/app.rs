/// Application state and router builder
///
/// This module defines the shared application state and builds the Axum
/// router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use infraiq_api::{app::AppState, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(pool, config)?;
/// let app = infraiq_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    middleware::{
        auth::{require_auth, require_service_key, API_KEY_HEADER, INTERNAL_KEY_HEADER},
        security::SecurityHeadersLayer,
    },
    routes,
};
use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use infraiq_shared::integrations::{
    clerk::ClerkClient, license_server::LicenseServerClient, stripe::StripeClient,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor. The pool
/// and the upstream clients are reference counted internally.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// Clerk session verification
    pub clerk: ClerkClient,

    /// Stripe checkout and billing portal
    pub stripe: StripeClient,

    /// License server
    pub license: LicenseServerClient,
}

impl AppState {
    /// Creates new application state
    ///
    /// All upstream clients share one HTTP client with the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built (TLS backend
    /// initialisation failure).
    pub fn new(db: PgPool, config: Config) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.upstream_timeout())
            .user_agent(concat!("infraiq-api/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            db,
            clerk: ClerkClient::new(http.clone(), config.clerk.clone()),
            stripe: StripeClient::new(http.clone(), config.stripe.clone()),
            license: LicenseServerClient::new(http, config.license_server.clone()),
            config: Arc::new(config),
        })
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── GET  /health                              # public
/// ├── /api/scans          GET, POST             # auth
/// │   └── /:id            GET, DELETE           # auth
/// ├── /api/projects       GET, POST             # auth
/// │   └── /:id            GET, PUT, DELETE      # auth
/// ├── /api/users/me       GET, POST             # auth
/// ├── /api/license
/// │   ├── POST /license-update                  # service key
/// │   ├── GET  /license-status                  # service key
/// │   ├── GET  /status                          # auth
/// │   ├── POST /validate                        # auth
/// │   └── POST /sync                            # auth
/// ├── /api/sync           POST                  # own owner resolution
/// │   └── GET /status                           # public
/// ├── /api/dashboard
/// │   ├── GET /stats                            # auth
/// │   └── GET /recommendations                  # auth
/// ├── /api/checkout
/// │   ├── POST /create-session                  # auth
/// │   ├── POST /create-portal-session           # auth
/// │   └── GET  /prices                          # public
/// └── /webhooks
///     ├── POST /clerk                           # Svix signature
///     └── POST /stripe                          # Stripe signature
/// ```
///
/// # Middleware Stack
///
/// Outermost first: security headers, CORS, response compression (gzip or
/// brotli, negotiated from `Accept-Encoding`), request tracing, then the
/// per-route authentication layers.
pub fn build_router(state: AppState) -> Router {
    let scan_routes = Router::new()
        .route("/", get(routes::scans::list_scans).post(routes::scans::create_scan))
        .route(
            "/:id",
            get(routes::scans::get_scan).delete(routes::scans::delete_scan),
        )
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let project_routes = Router::new()
        .route(
            "/",
            get(routes::projects::list_projects).post(routes::projects::create_project),
        )
        .route(
            "/:id",
            get(routes::projects::get_project)
                .put(routes::projects::update_project)
                .delete(routes::projects::delete_project),
        )
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let user_routes = Router::new()
        .route(
            "/me",
            get(routes::users::get_current_user).post(routes::users::upsert_current_user),
        )
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let license_service_routes = Router::new()
        .route("/license-update", post(routes::license::license_update))
        .route("/license-status", get(routes::license::license_status))
        .route_layer(from_fn_with_state(state.clone(), require_service_key));

    let license_user_routes = Router::new()
        .route("/status", get(routes::license::get_status))
        .route("/validate", post(routes::license::validate_license))
        .route("/sync", post(routes::license::sync_license))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let sync_routes = Router::new()
        .route("/", post(routes::sync::sync_scan))
        .route("/status", get(routes::sync::sync_status));

    let dashboard_routes = Router::new()
        .route("/stats", get(routes::dashboard::get_stats))
        .route("/recommendations", get(routes::dashboard::get_recommendations))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let checkout_routes = Router::new()
        .route("/create-session", post(routes::checkout::create_session))
        .route(
            "/create-portal-session",
            post(routes::checkout::create_portal_session),
        )
        .route_layer(from_fn_with_state(state.clone(), require_auth))
        .route("/prices", get(routes::checkout::get_prices));

    let webhook_routes = Router::new()
        .route("/clerk", post(routes::webhooks::clerk_webhook))
        .route("/stripe", post(routes::webhooks::stripe_webhook));

    let api_routes = Router::new()
        .nest("/scans", scan_routes)
        .nest("/projects", project_routes)
        .nest("/users", user_routes)
        .nest("/license", license_service_routes.merge(license_user_routes))
        .nest("/sync", sync_routes)
        .nest("/dashboard", dashboard_routes)
        .nest("/checkout", checkout_routes);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api", api_routes)
        .nest("/webhooks", webhook_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CompressionLayer::new())
        .layer(cors_layer(&state.config.api.cors_origins))
        .layer(SecurityHeadersLayer::new(state.config.api.production()))
        .with_state(state)
}

/// CORS for the dashboard origins, permissive when `*` is configured
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(API_KEY_HEADER),
            HeaderName::from_static(INTERNAL_KEY_HEADER),
        ])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}
