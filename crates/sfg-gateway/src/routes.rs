//! HTTP route definitions

use crate::{handlers, middleware, AppState};
use axum::{extract::DefaultBodyLimit, middleware as axum_middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Create the main router
///
/// `GET /` and `GET /health` answer the liveness check; every other method
/// and path goes to the object pipeline, which owns the 400/405 decisions.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Service endpoints
        .route(
            "/",
            get(handlers::health_check).fallback(handlers::object_request),
        )
        .route(
            "/health",
            get(handlers::health_check).fallback(handlers::object_request),
        )
        // Object endpoints
        .fallback(handlers::object_request)
        // Apply middleware
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
        .layer(axum_middleware::from_fn(middleware::request_id_middleware))
        .layer(TraceLayer::new_for_http())
        // Bodies are streamed to disk and bounded by Content-Length
        .layer(DefaultBodyLimit::disable())
        .with_state(state)
}
