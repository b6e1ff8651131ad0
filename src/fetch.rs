//! Fetching an input document over HTTP.
//!
//! # Responsibilities
//! - Describe the outbound request a snippet may use instead of inline JSON
//! - Validate it (method whitelist, URL scheme, header map, body size)
//! - Perform it within the request deadline and return the body as JSON
//!
//! # Design Decisions
//! - Off unless `fetch.enabled` is set: the server would otherwise request
//!   any URL a client names, including addresses on its private network
//! - The response body is read with a ceiling and must parse as JSON
//! - The fetched document is re-serialized compactly before reaching jq

use std::collections::BTreeMap;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::redirect::Policy;
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::config::FetchConfig;
use crate::resilience::Deadline;

/// Largest outbound request body accepted from a client.
pub const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;

const MAX_REDIRECTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Options,
    Head,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Head => "HEAD",
        }
    }

    fn as_method(self) -> Method {
        match self {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Delete => Method::DELETE,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Options => Method::OPTIONS,
            HttpMethod::Head => Method::HEAD,
        }
    }
}

/// An HTTP request whose response body is the input document.
///
/// `headers` is a JSON object of string values, kept as the client sent it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpSource {
    pub method: HttpMethod,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl HttpSource {
    /// Every problem with this request; empty when it can be sent.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if let Err(problem) = self.target() {
            problems.push(problem);
        }
        if let Err(problem) = self.header_map() {
            problems.push(problem);
        }
        if self.body.as_ref().is_some_and(|body| body.len() > MAX_REQUEST_BODY_BYTES) {
            problems.push(format!(
                "http.body must be at most {} bytes",
                MAX_REQUEST_BODY_BYTES
            ));
        }
        problems
    }

    fn target(&self) -> Result<Url, String> {
        let url = Url::parse(&self.url).map_err(|e| format!("http.url is invalid: {}", e))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(format!("http.url scheme `{}` is not supported", other)),
        }
    }

    fn header_map(&self) -> Result<HeaderMap, String> {
        let mut map = HeaderMap::new();
        let Some(raw) = self.headers.as_deref().filter(|raw| !raw.trim().is_empty()) else {
            return Ok(map);
        };

        let entries: BTreeMap<String, String> = serde_json::from_str(raw).map_err(|_| {
            "http.headers must be a JSON object with string values".to_string()
        })?;
        for (name, value) in entries {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| format!("http.headers: `{}` is not a valid header name", name))?;
            let value = HeaderValue::from_str(&value)
                .map_err(|_| format!("http.headers: value for `{}` is not valid", name))?;
            map.insert(name, value);
        }
        Ok(map)
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{0}")]
    Invalid(String),

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("response exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("response is not valid JSON: {0}")]
    NotJson(#[source] serde_json::Error),
}

impl FetchError {
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Invalid(_) => "fetch_invalid",
            FetchError::Request { .. } => "fetch_failed",
            FetchError::Status { .. } => "fetch_status",
            FetchError::TooLarge { .. } => "fetch_too_large",
            FetchError::NotJson(_) => "fetch_not_json",
        }
    }
}

/// Outbound HTTP client for input documents.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    max_response_bytes: usize,
}

impl Fetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, reqwest::Error> {
        // Proxy variables in the server's environment are not applied to
        // client-chosen URLs.
        let client = Client::builder()
            .redirect(Policy::limited(MAX_REDIRECTS))
            .no_proxy()
            .build()?;
        Ok(Self {
            client,
            max_response_bytes: config.max_response_bytes,
        })
    }

    /// Perform `source` and return its body as compact JSON text.
    pub async fn fetch(&self, source: &HttpSource, deadline: Deadline) -> Result<String, FetchError> {
        let url = source.target().map_err(FetchError::Invalid)?;
        let headers = source.header_map().map_err(FetchError::Invalid)?;
        let shown = url.to_string();

        let mut request = self
            .client
            .request(source.method.as_method(), url)
            .headers(headers)
            .timeout(deadline.remaining());
        if let Some(body) = &source.body {
            request = request.body(body.clone());
        }

        let failed = |err| FetchError::Request {
            url: shown.clone(),
            source: err,
        };
        let mut response = request.send().await.map_err(failed)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: shown.clone(),
                status: status.as_u16(),
            });
        }
        if response
            .content_length()
            .is_some_and(|len| len > self.max_response_bytes as u64)
        {
            return Err(FetchError::TooLarge {
                limit: self.max_response_bytes,
            });
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(failed)? {
            if body.len() + chunk.len() > self.max_response_bytes {
                return Err(FetchError::TooLarge {
                    limit: self.max_response_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }

        let document: serde_json::Value =
            serde_json::from_slice(&body).map_err(FetchError::NotJson)?;
        tracing::debug!(url = %shown, bytes = body.len(), "Fetched input document");
        Ok(document.to_string())
    }
}
