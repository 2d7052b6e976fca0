//! Router configuration for the web server.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use super::handlers;
use super::AppState;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/leads", get(handlers::list_leads))
        .route("/status", get(handlers::status))
        .route("/run", post(handlers::trigger_run))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
