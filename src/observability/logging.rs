//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Provide the access-log layer for the request pipeline
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - Log level configurable via config and `RUST_LOG`
//! - Every request runs inside a span carrying method, path and request id,
//!   so anything logged while handling it is correlated

use std::time::Duration;

use axum::http::{Method, Request, Response, StatusCode};
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{DefaultOnRequest, MakeSpan, OnResponse, TraceLayer};
use tracing::Span;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Mode, ObservabilityConfig};
use crate::http::request::{RequestId, RequestIdExt};
use crate::observability::metrics;

/// Install the global subscriber. Fails if one is already installed.
pub fn init(
    config: &ObservabilityConfig,
    mode: Mode,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "jqplay={level},tower_http={level}",
            level = config.log_level
        ))
    });

    let registry = tracing_subscriber::registry().with(filter);
    match mode {
        Mode::Production => registry
            .with(fmt::layer().json().with_current_span(true).with_span_list(false))
            .try_init(),
        Mode::Development => registry.with(fmt::layer().pretty()).try_init(),
    }
}

/// Opens the per-request span.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestSpan;

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let request_id = request.request_id().map(|id| id.as_str()).unwrap_or("-");
        request_span(request.method(), request.uri().path(), request_id)
    }
}

fn request_span(method: &Method, path: &str, request_id: &str) -> Span {
    tracing::info_span!(
        "request",
        method = %method,
        path = %path,
        request_id = %request_id,
    )
}

/// Emits one access-log event per response and records request metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessLog;

impl<B> OnResponse<B> for AccessLog {
    fn on_response(self, response: &Response<B>, latency: Duration, _span: &Span) {
        completed(response.status(), latency);
    }
}

fn completed(status: StatusCode, latency: Duration) {
    let status = status.as_u16();
    let latency_ms = latency.as_secs_f64() * 1000.0;
    tracing::info!(status, latency_ms, "Request completed");
    metrics::record_request(status, latency);
}

/// Access-log a response that was answered before the request reached the
/// access-log stage (deadline or size rejections), in the same span shape.
pub fn log_early_response(
    method: &Method,
    path: &str,
    request_id: &RequestId,
    status: StatusCode,
    latency: Duration,
) {
    let span = request_span(method, path, request_id.as_str());
    let _entered = span.enter();
    completed(status, latency);
}

pub type AccessLogLayer =
    TraceLayer<SharedClassifier<ServerErrorsAsFailures>, RequestSpan, DefaultOnRequest, AccessLog>;

pub fn access_log_layer() -> AccessLogLayer {
    TraceLayer::new_for_http()
        .make_span_with(RequestSpan)
        .on_response(AccessLog)
}
