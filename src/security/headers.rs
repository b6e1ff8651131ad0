//! Security response headers.
//!
//! # Responsibilities
//! - Add the security header set for the deployment mode to every response
//! - Leave headers a handler already set untouched
//!
//! # Design Decisions
//! - Production sends HSTS and denies framing outright
//! - Development allows same-origin framing and omits HSTS, since local
//!   servers usually run over plain HTTP

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{
        header::{
            REFERRER_POLICY, STRICT_TRANSPORT_SECURITY, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS,
            X_XSS_PROTECTION,
        },
        HeaderMap, HeaderName, HeaderValue,
    },
    middleware::Next,
    response::Response,
};

use crate::config::Mode;

/// The fixed header set for one deployment mode.
#[derive(Debug, Clone)]
pub struct SecurityHeaders {
    headers: Arc<[(HeaderName, HeaderValue)]>,
}

impl SecurityHeaders {
    pub fn for_mode(mode: Mode) -> Self {
        let headers: Vec<(HeaderName, HeaderValue)> = match mode {
            Mode::Production => vec![
                (X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")),
                (X_FRAME_OPTIONS, HeaderValue::from_static("DENY")),
                (
                    STRICT_TRANSPORT_SECURITY,
                    HeaderValue::from_static("max-age=31536000; includeSubDomains"),
                ),
                (
                    REFERRER_POLICY,
                    HeaderValue::from_static("strict-origin-when-cross-origin"),
                ),
                (X_XSS_PROTECTION, HeaderValue::from_static("1; mode=block")),
            ],
            Mode::Development => vec![
                (X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")),
                (X_FRAME_OPTIONS, HeaderValue::from_static("SAMEORIGIN")),
                (
                    REFERRER_POLICY,
                    HeaderValue::from_static("no-referrer-when-downgrade"),
                ),
            ],
        };

        Self {
            headers: headers.into(),
        }
    }

    /// Insert every header the map does not already carry.
    pub fn apply(&self, target: &mut HeaderMap) {
        for (name, value) in self.headers.iter() {
            if !target.contains_key(name) {
                target.insert(name.clone(), value.clone());
            }
        }
    }
}

pub async fn security_headers_middleware(
    State(policy): State<SecurityHeaders>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    policy.apply(response.headers_mut());
    response
}
