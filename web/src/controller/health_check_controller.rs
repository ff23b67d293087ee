use axum::http::StatusCode;
use axum::response::IntoResponse;

/// GET /health
///
/// Liveness check for the HTTP router itself; it does not look at the hub.
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "healthy")
}
