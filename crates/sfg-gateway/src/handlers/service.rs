//! Service-level handlers

use axum::{
    http::{header, StatusCode},
    response::IntoResponse,
};

/// Liveness check (GET / and GET /health)
pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        "ok\n",
    )
}
