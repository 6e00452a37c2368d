//! Camino REST API
//!
//! HTTP API layer for Camino, built with Axum.
//!
//! # Endpoints
//!
//! ## Points
//! - `GET /api/v1/journeys/:journey/points` - Ordered points of a journey
//! - `POST /api/v1/journeys/:journey/points` - Add a point (admin)
//! - `PATCH /api/v1/journeys/:journey/points/:id` - Edit a point (admin)
//!
//! ## Auth
//! - `POST /api/v1/auth/login` - Sign in, returns a bearer token
//! - `POST /api/v1/auth/logout` - End the session
//! - `GET /api/v1/auth/session` - Current admin
//!
//! ## Link previews
//! - `GET /api/metadata?url=...` - Page metadata for a point's link
//!
//! ## Health
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe
//! - `GET /health` - Full health status
//!
//! ## WebSocket
//! - `GET /api/v1/ws` - Live journey snapshots
//!
//! # Example
//!
//! ```rust,ignore
//! use camino::api::{serve, AppState};
//! use camino::config::Config;
//! use camino::points::MemoryPointStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_default();
//!     let state = AppState::new(Arc::new(MemoryPointStore::new()), config)?;
//!     serve(state).await?;
//!     Ok(())
//! }
//! ```

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use routes::auth::AdminSession;
pub use state::AppState;

use axum::{
    http::HeaderValue,
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ApiConfig;
use crate::websocket::websocket_handler;

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Point routes
        .route(
            "/journeys/:journey/points",
            get(routes::points::list_points).post(routes::points::create_point),
        )
        .route(
            "/journeys/:journey/points/:id",
            patch(routes::points::update_point),
        )
        // Auth routes
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/logout", post(routes::auth::logout))
        .route("/auth/session", get(routes::auth::current_session))
        // WebSocket route
        .route("/ws", get(websocket_handler));

    let metadata_route = get(routes::metadata::get_metadata)
        .options(routes::metadata::preflight)
        .fallback(routes::metadata::method_not_allowed);

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/ready", get(routes::health::readiness))
        .route("/", get(routes::health::full_health));

    let cors = cors_layer(&state.config.api);
    let timeout = Duration::from_secs(state.config.api.request_timeout_secs);

    // Create shared state
    let shared_state = Arc::new(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/api/metadata", metadata_route)
        .nest("/health", health_routes)
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(shared_state)
}

/// Any origin unless `cors_origins` lists some
fn cors_layer(config: &ApiConfig) -> CorsLayer {
    if config.cors_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Start the API server
pub async fn serve(state: AppState) -> Result<(), ApiError> {
    let addr = state.config.api.addr();
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Camino API listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("Camino API shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
