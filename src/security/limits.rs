//! Request body size limit.
//!
//! # Responsibilities
//! - Reject bodies whose declared `Content-Length` exceeds the limit with
//!   413 before the handler runs
//! - Cap bodies without a declared length while they stream, so a chunked
//!   upload cannot exceed the limit either
//!
//! # Design Decisions
//! - The streaming cap is `http_body_util::Limited`; extractors surface its
//!   error as 413 as well
//! - The active limit is stored in request extensions so extractors can
//!   report it

use axum::{
    body::Body,
    extract::{Request, State},
    http::header::CONTENT_LENGTH,
    middleware::Next,
    response::{IntoResponse, Response},
};
use http_body_util::Limited;

use crate::http::request::correlation_id;
use crate::http::response::ApiError;

/// Maximum accepted request body in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyLimit {
    pub max_bytes: usize,
}

impl BodyLimit {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    /// Whether a declared length is over the limit.
    pub fn exceeded_by(&self, declared: u64) -> bool {
        declared > self.max_bytes as u64
    }
}

pub async fn body_limit_middleware(
    State(limit): State<BodyLimit>,
    request: Request,
    next: Next,
) -> Response {
    let declared = request
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok());

    if let Some(length) = declared {
        if limit.exceeded_by(length) {
            let request_id = correlation_id(&request);
            tracing::warn!(
                request_id = %request_id,
                method = %request.method(),
                path = %request.uri().path(),
                content_length = length,
                max_bytes = limit.max_bytes,
                "Request body over limit"
            );
            return ApiError::PayloadTooLarge {
                limit: Some(limit.max_bytes),
            }
            .into_response();
        }
    }

    let (mut parts, body) = request.into_parts();
    parts.extensions.insert(limit);
    let body = Body::new(Limited::new(body, limit.max_bytes));
    next.run(Request::from_parts(parts, body)).await
}
