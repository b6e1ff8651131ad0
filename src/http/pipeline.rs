//! The request pipeline.
//!
//! Every request passes the stages in this order, outermost first:
//!
//! ```text
//! timeout → body limit → security headers → request id → access log → panic recovery → handler
//! ```
//!
//! A stage may answer on its own (408, 413); the stages outside it still
//! see that response on the way out.

use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;

use crate::config::{AppConfig, Mode};
use crate::handlers::{self, AppState};
use crate::http::request::request_id_middleware;
use crate::observability::logging;
use crate::resilience::{recovery, timeouts::timeout_middleware, TimeoutPolicy};
use crate::security::{
    headers::security_headers_middleware, limits::body_limit_middleware, BodyLimit,
    SecurityHeaders,
};

/// Settings shared by the pipeline stages.
#[derive(Debug, Clone)]
pub struct PipelinePolicy {
    pub request_timeout: Duration,
    pub max_body_bytes: usize,
    pub mode: Mode,
}

impl PipelinePolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            request_timeout: config.timeouts.request(),
            max_body_bytes: config.limits.max_body_bytes,
            mode: config.mode,
        }
    }
}

/// Wrap `router` in the full pipeline.
pub fn apply(router: Router, policy: &PipelinePolicy) -> Router {
    let headers = SecurityHeaders::for_mode(policy.mode);

    let stages = ServiceBuilder::new()
        .layer(from_fn_with_state(
            TimeoutPolicy {
                timeout: policy.request_timeout,
                headers: headers.clone(),
            },
            timeout_middleware,
        ))
        .layer(from_fn_with_state(
            BodyLimit::new(policy.max_body_bytes),
            body_limit_middleware,
        ))
        .layer(from_fn_with_state(headers, security_headers_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(logging::access_log_layer())
        .layer(recovery::layer());

    // The body limit stage owns size enforcement.
    router.layer(DefaultBodyLimit::disable()).layer(stages)
}

/// All routes, wrapped in the pipeline.
pub fn build_router(state: AppState, policy: &PipelinePolicy) -> Router {
    let routes = Router::new()
        .route("/", get(handlers::index::landing))
        .route(
            "/jq",
            get(handlers::jq::evaluate_query).post(handlers::jq::evaluate_body),
        )
        .route("/s", post(handlers::share::create))
        .route("/s/{id}", get(handlers::share::retrieve))
        .route("/ping", get(handlers::system::ping))
        .fallback(handlers::system::not_found)
        .with_state(state);

    apply(routes, policy)
}
