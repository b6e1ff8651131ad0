//! `GET /jq` and `POST /jq`: evaluate a filter against an input document.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use super::extract::{JsonBody, QueryParams};
use super::{AppState, Submission};
use crate::engine::{EngineError, JqOption, Output};
use crate::fetch::HttpSource;
use crate::http::request::RequestContext;
use crate::http::response::ApiError;
use crate::observability::metrics;
use crate::resilience::Deadline;

/// Query-string form: `?query=.a&json={"a":1}&options=-c,-r`.
#[derive(Debug, Deserialize)]
pub struct EvaluateParams {
    #[serde(default)]
    pub query: String,
    pub json: Option<String>,
    #[serde(default)]
    pub options: String,
}

/// JSON body form. `http` names a document to fetch instead of `json`.
#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    #[serde(default)]
    pub query: String,
    pub json: Option<String>,
    pub http: Option<HttpSource>,
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct EvaluateResponse {
    pub result: String,
}

pub async fn evaluate_query(
    State(state): State<AppState>,
    context: RequestContext,
    QueryParams(params): QueryParams<EvaluateParams>,
) -> Result<Json<EvaluateResponse>, ApiError> {
    let submission = Submission::validate(
        params.query,
        params.json,
        None,
        JqOption::parse_list(&params.options),
    )?;
    evaluate(&state, &context, submission).await
}

pub async fn evaluate_body(
    State(state): State<AppState>,
    context: RequestContext,
    JsonBody(body): JsonBody<EvaluateRequest>,
) -> Result<Json<EvaluateResponse>, ApiError> {
    let submission = Submission::validate(
        body.query,
        body.json,
        body.http,
        JqOption::parse_all(body.options.iter().map(String::as_str)),
    )?;
    state.admit(&submission)?;
    evaluate(&state, &context, submission).await
}

/// Fetch the input if needed and run the engine, abandoning both at the
/// request deadline.
async fn evaluate(
    state: &AppState,
    context: &RequestContext,
    submission: Submission,
) -> Result<Json<EvaluateResponse>, ApiError> {
    let deadline = context.deadline();

    match tokio::time::timeout_at(deadline.instant(), run(state, deadline, submission)).await {
        Ok(Ok(output)) => {
            metrics::record_evaluation("ok");
            Ok(Json(EvaluateResponse {
                result: output.text,
            }))
        }
        Ok(Err(err)) => {
            metrics::record_evaluation(err.kind());
            Err(err)
        }
        Err(_) => {
            metrics::record_evaluation("timeout");
            tracing::warn!(
                request_id = %context.request_id(),
                "Evaluation abandoned at request deadline"
            );
            Err(ApiError::EvaluationTimeout)
        }
    }
}

async fn run(
    state: &AppState,
    deadline: Deadline,
    submission: Submission,
) -> Result<Output, ApiError> {
    let fetched = match (&submission.http, &state.fetcher) {
        (Some(source), Some(fetcher)) => {
            let document = fetcher.fetch(source, deadline).await.map_err(|err| {
                tracing::info!(kind = err.kind(), error = %err, "Input fetch failed");
                ApiError::Fetch(err)
            })?;
            Some(document)
        }
        _ => None,
    };

    state
        .engine
        .run(submission.into_program(fetched))
        .await
        .map_err(|err| {
            match &err {
                EngineError::Unavailable(source) => {
                    tracing::error!(error = %source, "Evaluation engine unavailable")
                }
                other => tracing::debug!(kind = other.kind(), error = %other, "Evaluation failed"),
            }
            ApiError::Evaluation(err)
        })
}
