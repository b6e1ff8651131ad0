//! Request correlation and per-request context.
//!
//! # Responsibilities
//! - Assign every request a correlation id (propagated or generated)
//! - Echo the id on the response as `x-request-id`
//! - Expose id and deadline to handlers through `RequestContext`
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - An inbound id is trusted only if it is short visible ASCII; anything
//!   else is replaced with a fresh UUID
//! - The id is set once per request and never changed afterwards

use std::convert::Infallible;
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use axum::{
    extract::{FromRequestParts, Request},
    http::{request::Parts, HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::resilience::Deadline;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

const MAX_INBOUND_ID_LEN: usize = 128;

/// Deadline used when a handler runs outside the full pipeline.
const FALLBACK_TIMEOUT: Duration = Duration::from_secs(5);

/// Correlation identifier for one request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Use the inbound id if it is usable, otherwise generate one.
    pub fn from_inbound(inbound: Option<&HeaderValue>) -> Self {
        inbound
            .and_then(Self::from_header)
            .unwrap_or_else(Self::generate)
    }

    /// Accept an inbound header value if it is 1..=128 visible ASCII bytes.
    pub fn from_header(value: &HeaderValue) -> Option<Self> {
        let bytes = value.as_bytes();
        if bytes.is_empty() || bytes.len() > MAX_INBOUND_ID_LEN {
            return None;
        }
        if !bytes.iter().all(u8::is_ascii_graphic) {
            return None;
        }
        value.to_str().ok().map(|id| Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn header_value(&self) -> Option<HeaderValue> {
        HeaderValue::from_str(&self.0).ok()
    }

    pub fn insert_into(&self, headers: &mut HeaderMap) {
        if let Some(value) = self.header_value() {
            headers.insert(X_REQUEST_ID, value);
        }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Access to the correlation id stored on a request.
pub trait RequestIdExt {
    fn request_id(&self) -> Option<&RequestId>;
}

impl<B> RequestIdExt for axum::http::Request<B> {
    fn request_id(&self) -> Option<&RequestId> {
        self.extensions().get::<RequestId>()
    }
}

impl RequestIdExt for Parts {
    fn request_id(&self) -> Option<&RequestId> {
        self.extensions.get::<RequestId>()
    }
}

/// Write-once cell holding the request's id, created by the outermost
/// stage. Whichever stage needs the id first resolves it, so responses
/// produced before the correlation stage still report the same id.
#[derive(Debug, Clone, Default)]
pub struct CorrelationSlot(Arc<OnceLock<RequestId>>);

impl CorrelationSlot {
    pub fn resolve(&self, inbound: Option<&HeaderValue>) -> RequestId {
        self.0.get_or_init(|| RequestId::from_inbound(inbound)).clone()
    }

    pub fn get(&self) -> Option<RequestId> {
        self.0.get().cloned()
    }
}

/// The request's correlation id, resolving it if no stage has yet.
pub fn correlation_id<B>(request: &axum::http::Request<B>) -> RequestId {
    let inbound = request.headers().get(X_REQUEST_ID);
    match request.extensions().get::<CorrelationSlot>() {
        Some(slot) => slot.resolve(inbound),
        None => RequestId::from_inbound(inbound),
    }
}

pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let id = correlation_id(&request);

    id.insert_into(request.headers_mut());
    request.extensions_mut().insert(id.clone());

    let mut response = next.run(request).await;
    id.insert_into(response.headers_mut());
    response
}

/// Per-request facts handlers may read: correlation id and deadline.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: RequestId,
    deadline: Deadline,
}

impl RequestContext {
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    pub fn deadline(&self) -> Deadline {
        self.deadline
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let request_id = parts
            .request_id()
            .cloned()
            .unwrap_or_else(RequestId::generate);
        let deadline = parts
            .extensions
            .get::<Deadline>()
            .copied()
            .unwrap_or_else(|| Deadline::after(FALLBACK_TIMEOUT));

        Ok(Self {
            request_id,
            deadline,
        })
    }
}
