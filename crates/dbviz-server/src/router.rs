//! Router assembly.
//!
//! [`build_router`] wires the catalogue routes and the WebSocket endpoint,
//! with permissive CORS and request tracing.

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::catalog::health))
        .route("/api/projects", get(handlers::catalog::list_projects))
        .route("/api/topics", get(handlers::catalog::list_topics))
        .route("/api/scenarios", get(handlers::catalog::list_scenarios))
        .route("/api/scenarios/{id}", get(handlers::catalog::get_scenario))
        .route("/ws", get(handlers::ws::upgrade))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
