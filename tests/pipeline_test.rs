//! Cross-cutting request pipeline behavior.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    routing::{get, post},
    Router,
};
use jqplay::config::Mode;
use jqplay::http::pipeline::{self, PipelinePolicy};
use jqplay::http::X_REQUEST_ID;
use tower::ServiceExt;

mod common;

fn policy(mode: Mode) -> PipelinePolicy {
    PipelinePolicy {
        request_timeout: Duration::from_millis(200),
        max_body_bytes: 1024,
        mode,
    }
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn oversized_body_never_reaches_the_handler() {
    let invoked = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&invoked);
    let router = Router::new().route(
        "/upload",
        post(move |_body: String| {
            let flag = Arc::clone(&flag);
            async move {
                flag.store(true, Ordering::SeqCst);
                "stored"
            }
        }),
    );
    let app = pipeline::apply(router, &policy(Mode::Production));

    let response = app
        .oneshot(
            Request::post("/upload")
                .header(header::CONTENT_LENGTH, "2048")
                .body(Body::from(vec![b'x'; 2048]))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(response.headers().contains_key(X_REQUEST_ID));
    assert_eq!(response.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert!(!invoked.load(Ordering::SeqCst));
    assert_eq!(json_body(response).await["error"]["kind"], "payload_too_large");
}

#[tokio::test]
async fn body_at_the_limit_is_accepted() {
    let router = Router::new().route("/upload", post(|body: String| async move { body.len().to_string() }));
    let app = pipeline::apply(router, &policy(Mode::Production));

    let response = app
        .oneshot(
            Request::post("/upload")
                .body(Body::from(vec![b'x'; 1024]))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn slow_handler_gets_a_timeout_response() {
    let router = Router::new().route(
        "/slow",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            "late"
        }),
    );
    let app = pipeline::apply(router, &policy(Mode::Production));

    let started = std::time::Instant::now();
    let response = app
        .oneshot(
            Request::get("/slow")
                .header(X_REQUEST_ID, "slow-call-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    assert_eq!(response.headers()[X_REQUEST_ID], "slow-call-1");
    assert_eq!(response.headers()[header::X_FRAME_OPTIONS], "DENY");
    assert_eq!(json_body(response).await["error"]["kind"], "timeout");
}

#[tokio::test]
async fn panicking_handler_becomes_500_and_service_survives() {
    let router = Router::new()
        .route(
            "/boom",
            get(|| async {
                if true {
                    panic!("handler exploded");
                }
                "unreachable"
            }),
        )
        .route("/ok", get(|| async { "fine" }));
    let app = pipeline::apply(router, &policy(Mode::Production));

    let response = app
        .clone()
        .oneshot(Request::get("/boom").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.headers().contains_key(X_REQUEST_ID));
    let body = json_body(response).await;
    assert_eq!(body["error"]["kind"], "internal");
    assert!(!body.to_string().contains("exploded"));

    let response = app
        .oneshot(Request::get("/ok").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn security_headers_follow_the_mode() {
    let router = || Router::new().route("/", get(|| async { "hi" }));

    let production = pipeline::apply(router(), &policy(Mode::Production))
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(production.headers()[header::X_FRAME_OPTIONS], "DENY");
    assert!(production
        .headers()
        .contains_key(header::STRICT_TRANSPORT_SECURITY));

    let development = pipeline::apply(router(), &policy(Mode::Development))
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(development.headers()[header::X_FRAME_OPTIONS], "SAMEORIGIN");
    assert!(!development
        .headers()
        .contains_key(header::STRICT_TRANSPORT_SECURITY));
}

#[tokio::test]
async fn invalid_inbound_request_id_is_replaced() {
    let router = Router::new().route("/", get(|| async { "hi" }));
    let app = pipeline::apply(router, &policy(Mode::Development));

    let long_id = "x".repeat(200);
    let response = app
        .oneshot(
            Request::get("/")
                .header(X_REQUEST_ID, long_id.as_str())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let id = response.headers()[X_REQUEST_ID].to_str().unwrap();
    assert!(!id.is_empty());
    assert_ne!(id, long_id);
}

#[tokio::test]
async fn concurrent_responses_have_unique_request_ids() {
    let app = common::spawn_app().await;

    let requests = (0..50).map(|_| {
        let client = app.client.clone();
        let url = app.url("/ping");
        tokio::spawn(async move { client.get(url).send().await.unwrap() })
    });

    let mut ids = HashSet::new();
    for request in requests.collect::<Vec<_>>() {
        let response = request.await.unwrap();
        assert_eq!(response.status(), 200);
        let id = response.headers()["x-request-id"].to_str().unwrap().to_string();
        assert!(!id.is_empty());
        ids.insert(id);
    }
    assert_eq!(ids.len(), 50);

    app.stop().await.unwrap();
}

#[tokio::test]
async fn unknown_route_is_a_structured_404() {
    let app = common::spawn_app().await;

    let response = app.client.get(app.url("/nope")).send().await.unwrap();
    assert_eq!(response.status(), 404);
    assert!(response.headers().contains_key("x-request-id"));
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"]["kind"], "not_found");

    app.stop().await.unwrap();
}
