//! Error responses.
//!
//! # Responsibilities
//! - One error type for every failure a handler or stage can report
//! - Map each failure to its status code and structured JSON body
//!
//! # Design Decisions
//! - Bodies are `{"error": {"kind", "message"}}`, except validation
//!   failures which list every problem under `errors`
//! - Storage failures also return the request id so users can report it
//! - Internal details (storage errors, panic messages) are logged, never sent

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::engine::EngineError;
use crate::fetch::FetchError;
use crate::http::request::RequestId;
use crate::storage::StoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("request body is too large")]
    PayloadTooLarge { limit: Option<usize> },

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Evaluation(#[from] EngineError),

    #[error("could not fetch input: {0}")]
    Fetch(#[from] FetchError),

    #[error("evaluation did not finish before the request deadline")]
    EvaluationTimeout,

    #[error("request did not complete before its deadline")]
    RequestTimeout,

    #[error("storage failure: {source}")]
    Storage {
        #[source]
        source: StoreError,
        request_id: RequestId,
    },

    #[error("internal server error")]
    Internal,
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(vec![message.into()])
    }

    pub fn storage(source: StoreError, request_id: &RequestId) -> Self {
        Self::Storage {
            source,
            request_id: request_id.clone(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Evaluation(err) => match err {
                EngineError::Compile(_) => StatusCode::BAD_REQUEST,
                EngineError::Runtime(_) | EngineError::OutputTooLarge { .. } => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                EngineError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
            Self::Fetch(FetchError::Invalid(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Fetch(_) => StatusCode::BAD_GATEWAY,
            Self::EvaluationTimeout | Self::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            Self::Storage { .. } | Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::PayloadTooLarge { .. } => "payload_too_large",
            Self::NotFound(_) => "not_found",
            Self::Evaluation(err) => err.kind(),
            Self::Fetch(err) => err.kind(),
            Self::EvaluationTimeout | Self::RequestTimeout => "timeout",
            Self::Storage { .. } => "storage",
            Self::Internal => "internal",
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::PayloadTooLarge { limit: Some(limit) } => {
                format!("request body exceeds {} bytes", limit)
            }
            Self::Evaluation(EngineError::Unavailable(_)) => {
                "the jq engine is not available".to_string()
            }
            Self::Storage { .. } => "failed to store snippet".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::Validation(errors) => json!({ "errors": errors }),
            Self::Storage { request_id, .. } => json!({
                "error": { "kind": self.kind(), "message": self.public_message() },
                "request_id": request_id.as_str(),
            }),
            _ => json!({
                "error": { "kind": self.kind(), "message": self.public_message() },
            }),
        };

        (status, Json(body)).into_response()
    }
}
