//! Request handlers.
//!
//! # Data Flow
//! ```text
//! pipeline
//!     → extract.rs (typed JSON / query input, rejections as ApiError)
//!     → Submission::validate (size limits, option whitelist)
//!     → jq.rs (evaluate) | share.rs (create, retrieve) | index.rs | system.rs
//! ```

pub mod extract;
pub mod index;
pub mod jq;
pub mod share;
pub mod system;

use std::sync::Arc;

use crate::engine::options::UnknownOption;
use crate::engine::{Engine, JqOption, Program};
use crate::fetch::{Fetcher, HttpSource};
use crate::http::response::ApiError;
use crate::landing::LandingPage;
use crate::storage::{NewSnippet, SnippetStore};

pub const MAX_QUERY_BYTES: usize = 256 * 1024;
pub const MAX_JSON_BYTES: usize = 1024 * 1024;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<dyn Engine>,
    pub store: Arc<dyn SnippetStore>,
    pub landing: Arc<LandingPage>,
    /// Present only when fetching input over HTTP is enabled.
    pub fetcher: Option<Arc<Fetcher>>,
}

impl AppState {
    /// Reject submissions that need a capability this server has switched off.
    pub fn admit(&self, submission: &Submission) -> Result<(), ApiError> {
        if submission.http.is_some() && self.fetcher.is_none() {
            return Err(ApiError::validation("http input is disabled on this server"));
        }
        Ok(())
    }
}

/// A validated query, input source and option set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub query: String,
    pub json: Option<String>,
    pub http: Option<HttpSource>,
    pub options: Vec<JqOption>,
}

impl Submission {
    /// Check every field and report all problems at once.
    ///
    /// The input comes from exactly one of `json` and `http`, unless `-n` is
    /// set. An empty `json` counts as absent, except under `-n` where it is
    /// kept as given.
    pub fn validate(
        query: String,
        json: Option<String>,
        http: Option<HttpSource>,
        options: Result<Vec<JqOption>, Vec<UnknownOption>>,
    ) -> Result<Self, ApiError> {
        let mut errors = Vec::new();

        if query.trim().is_empty() {
            errors.push("query must not be empty".to_string());
        } else if query.len() > MAX_QUERY_BYTES {
            errors.push(format!("query must be at most {} bytes", MAX_QUERY_BYTES));
        }

        let options = options.unwrap_or_else(|unknown| {
            errors.extend(unknown.iter().map(ToString::to_string));
            Vec::new()
        });
        let null_input = options.contains(&JqOption::NullInput);

        let json = json.filter(|json| !json.is_empty() || (null_input && http.is_none()));
        if json.as_ref().is_some_and(|json| json.len() > MAX_JSON_BYTES) {
            errors.push(format!("json must be at most {} bytes", MAX_JSON_BYTES));
        }
        if let Some(http) = &http {
            errors.extend(http.problems());
        }

        match (&json, &http) {
            (Some(_), Some(_)) => errors.push("provide either json or http, not both".to_string()),
            (None, None) if !null_input => {
                errors.push("json or http is required unless the -n option is set".to_string())
            }
            _ => {}
        }

        if errors.is_empty() {
            Ok(Self {
                query,
                json,
                http,
                options,
            })
        } else {
            Err(ApiError::Validation(errors))
        }
    }

    /// The program to run. `fetched` replaces the inline input when the
    /// document came from an `http` source.
    pub fn into_program(self, fetched: Option<String>) -> Program {
        Program {
            query: self.query,
            input: fetched.or(self.json).unwrap_or_default(),
            options: self.options,
        }
    }

    pub fn into_snippet(self) -> NewSnippet {
        NewSnippet::new(self.query, self.json, self.http, self.options)
    }
}
