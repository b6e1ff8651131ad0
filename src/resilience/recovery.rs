//! Panic isolation for handlers.
//!
//! A panic inside a handler unwinds to the `CatchPanicLayer` boundary, is
//! logged inside the request span (so the log line carries the request id),
//! and becomes a generic 500. The connection and the process keep running.

use std::any::Any;

use axum::response::{IntoResponse, Response};
use tower_http::catch_panic::CatchPanicLayer;

use crate::http::response::ApiError;
use crate::observability::metrics;

type PanicHandler = fn(Box<dyn Any + Send + 'static>) -> Response;

pub type RecoveryLayer = CatchPanicLayer<PanicHandler>;

pub fn layer() -> RecoveryLayer {
    CatchPanicLayer::custom(handle_panic as PanicHandler)
}

fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let message = panic_message(payload.as_ref());
    tracing::error!(panic = %message, "Handler panicked");
    metrics::record_panic();
    ApiError::Internal.into_response()
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
