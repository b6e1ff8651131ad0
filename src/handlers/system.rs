use axum::http::Uri;

use crate::http::response::ApiError;

/// Liveness check. Touches no shared state.
pub async fn ping() -> &'static str {
    "pong"
}

pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("no route for {}", uri.path()))
}
