//! `POST /s` and `GET /s/{id}`: share a snippet and look it up again.

use axum::{
    extract::{Path, State},
    http::{header::ACCEPT, HeaderMap},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use super::extract::JsonBody;
use super::{AppState, Submission};
use crate::http::request::RequestContext;
use crate::http::response::ApiError;
use crate::engine::JqOption;
use crate::fetch::HttpSource;
use crate::storage::SnippetId;

#[derive(Debug, Deserialize)]
pub struct ShareRequest {
    #[serde(default)]
    pub query: String,
    pub json: Option<String>,
    pub http: Option<HttpSource>,
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ShareCreated {
    pub id: SnippetId,
}

pub async fn create(
    State(state): State<AppState>,
    context: RequestContext,
    JsonBody(body): JsonBody<ShareRequest>,
) -> Result<Json<ShareCreated>, ApiError> {
    let submission = Submission::validate(
        body.query,
        body.json,
        body.http,
        JqOption::parse_all(body.options.iter().map(String::as_str)),
    )?;
    state.admit(&submission)?;
    let snippet = submission.into_snippet();
    let id = SnippetId::derive(&snippet);

    let stored = state.store.insert(id, snippet).await.map_err(|err| {
        tracing::error!(
            request_id = %context.request_id(),
            error = %err,
            "Failed to store snippet"
        );
        ApiError::storage(err, context.request_id())
    })?;

    tracing::info!(snippet_id = %stored.id, "Snippet shared");
    Ok(Json(ShareCreated { id: stored.id }))
}

/// Returns the snippet as JSON, or the playground page preloaded with it
/// when the client prefers HTML.
pub async fn retrieve(
    State(state): State<AppState>,
    context: RequestContext,
    Path(raw_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let not_found = || ApiError::NotFound(format!("snippet `{}` not found", raw_id));

    let id = SnippetId::parse(&raw_id).ok_or_else(not_found)?;
    let snippet = state
        .store
        .get(&id)
        .await
        .map_err(|err| {
            tracing::error!(
                request_id = %context.request_id(),
                snippet_id = %id,
                error = %err,
                "Failed to load snippet"
            );
            ApiError::storage(err, context.request_id())
        })?
        .ok_or_else(not_found)?;

    if prefers_html(&headers) {
        Ok(Html(state.landing.render(Some(&snippet))).into_response())
    } else {
        Ok(Json(snippet).into_response())
    }
}

fn prefers_html(headers: &HeaderMap) -> bool {
    headers
        .get(ACCEPT)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"))
}
