//! Timeout enforcement.
//!
//! # Responsibilities
//! - Attach a deadline to every request before any other stage runs
//! - Race the rest of the pipeline against that deadline
//! - Short-circuit with 408 Request Timeout when it elapses
//! - Access-log responses answered before the access-log stage saw them
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - The deadline is an absolute instant so handlers can bound their own
//!   work (the evaluate handler cuts the engine off at the same instant)
//! - Being outermost, this stage also makes sure every response leaving the
//!   pipeline carries the correlation id and security headers, including
//!   responses produced before the stages that normally add them

use std::time::Duration;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::time::Instant;

use crate::http::request::{CorrelationSlot, X_REQUEST_ID};
use crate::http::response::ApiError;
use crate::observability::logging;
use crate::security::headers::SecurityHeaders;

/// Absolute instant after which a request is expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Instant);

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        Self(Instant::now() + timeout)
    }

    pub fn instant(&self) -> Instant {
        self.0
    }

    pub fn remaining(&self) -> Duration {
        self.0.saturating_duration_since(Instant::now())
    }
}

/// State for the timeout stage.
#[derive(Debug, Clone)]
pub struct TimeoutPolicy {
    pub timeout: Duration,
    pub headers: SecurityHeaders,
}

pub async fn timeout_middleware(
    State(policy): State<TimeoutPolicy>,
    mut request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let deadline = Deadline::after(policy.timeout);
    let slot = CorrelationSlot::default();
    let inbound = request.headers().get(X_REQUEST_ID).cloned();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    request.extensions_mut().insert(deadline);
    request.extensions_mut().insert(slot.clone());

    let mut response = match tokio::time::timeout_at(deadline.instant(), next.run(request)).await
    {
        Ok(response) => response,
        Err(_) => {
            let request_id = slot.resolve(inbound.as_ref());
            tracing::warn!(
                request_id = %request_id,
                timeout_ms = policy.timeout.as_millis() as u64,
                "Request deadline exceeded"
            );
            ApiError::RequestTimeout.into_response()
        }
    };

    // Every response that passed the correlation stage carries the id, and
    // the access-log stage sits inside it. Anything else was answered early.
    if !response.headers().contains_key(X_REQUEST_ID) {
        let request_id = slot.resolve(inbound.as_ref());
        request_id.insert_into(response.headers_mut());
        logging::log_early_response(
            &method,
            &path,
            &request_id,
            response.status(),
            started.elapsed(),
        );
    }
    policy.headers.apply(response.headers_mut());
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deadline_counts_down() {
        let deadline = Deadline::after(Duration::from_secs(60));
        assert!(deadline.remaining() <= Duration::from_secs(60));
        assert!(deadline.remaining() > Duration::from_secs(59));
    }

    #[tokio::test]
    async fn passed_deadline_has_nothing_left() {
        let deadline = Deadline::after(Duration::ZERO);
        assert_eq!(deadline.remaining(), Duration::ZERO);
        assert!(deadline.instant() <= Instant::now());
    }
}
