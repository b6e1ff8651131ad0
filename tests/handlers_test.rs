//! Evaluate, share and system handlers over real HTTP.

use serde_json::{json, Value};

mod common;

#[tokio::test]
async fn ping_answers_pong() {
    let app = common::spawn_app().await;

    let response = app.client.get(app.url("/ping")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "pong");

    app.stop().await.unwrap();
}

#[tokio::test]
async fn landing_page_is_html() {
    let app = common::spawn_app().await;

    let response = app.client.get(app.url("/")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    assert!(response.text().await.unwrap().contains("jq play"));

    app.stop().await.unwrap();
}

#[tokio::test]
async fn evaluate_via_post() {
    let app = common::spawn_app().await;

    let response = app
        .client
        .post(app.url("/jq"))
        .json(&json!({ "query": ".a", "json": "{\"a\":1}", "options": ["-c"] }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["result"], ".a {\"a\":1}");

    app.stop().await.unwrap();
}

#[tokio::test]
async fn evaluate_via_query_string() {
    let app = common::spawn_app().await;

    let response = app
        .client
        .get(app.url("/jq"))
        .query(&[("query", "1 + 1"), ("options", "-n,-c")])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["result"], "1 + 1 ");

    app.stop().await.unwrap();
}

#[tokio::test]
async fn evaluation_errors_are_structured() {
    let app = common::spawn_app().await;

    let syntax = app
        .client
        .post(app.url("/jq"))
        .json(&json!({ "query": "syntax error", "json": "{}" }))
        .send()
        .await
        .unwrap();
    assert_eq!(syntax.status(), 400);
    let body: Value = syntax.json().await.unwrap();
    assert_eq!(body["error"]["kind"], "syntax");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("syntax error"));

    let runtime = app
        .client
        .post(app.url("/jq"))
        .json(&json!({ "query": "runtime error", "json": "null" }))
        .send()
        .await
        .unwrap();
    assert_eq!(runtime.status(), 422);
    let body: Value = runtime.json().await.unwrap();
    assert_eq!(body["error"]["kind"], "runtime");

    app.stop().await.unwrap();
}

#[tokio::test]
async fn invalid_input_lists_every_problem() {
    let app = common::spawn_app().await;

    let response = app
        .client
        .post(app.url("/jq"))
        .json(&json!({ "query": "", "options": ["--bogus"] }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 422);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["errors"].as_array().unwrap().len(), 3);

    app.stop().await.unwrap();
}

#[tokio::test]
async fn malformed_json_body_is_a_validation_error() {
    let app = common::spawn_app().await;

    let response = app
        .client
        .post(app.url("/jq"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 422);
    let body: Value = response.json().await.unwrap();
    assert!(body["errors"].is_array());

    app.stop().await.unwrap();
}

#[tokio::test]
async fn non_terminating_evaluation_is_cut_off() {
    let mut config = common::test_config();
    config.timeouts.request_ms = 200;
    let app = common::spawn_app_with(config).await;

    let started = std::time::Instant::now();
    let response = app
        .client
        .post(app.url("/jq"))
        .json(&json!({ "query": "sleep:60000", "json": "{}" }))
        .send()
        .await
        .unwrap();

    assert!(started.elapsed() < std::time::Duration::from_secs(5));
    assert_eq!(response.status(), 408);
    assert!(response.headers().contains_key("x-request-id"));
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["kind"], "timeout");

    // The service is still healthy afterwards.
    let ping = app.client.get(app.url("/ping")).send().await.unwrap();
    assert_eq!(ping.status(), 200);

    app.stop().await.unwrap();
}

#[tokio::test]
async fn engine_panic_is_isolated() {
    let app = common::spawn_app().await;

    let response = app
        .client
        .post(app.url("/jq"))
        .json(&json!({ "query": "panic", "json": "{}" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 500);

    let ping = app.client.get(app.url("/ping")).send().await.unwrap();
    assert_eq!(ping.status(), 200);

    app.stop().await.unwrap();
}

#[tokio::test]
async fn share_round_trip() {
    let app = common::spawn_app().await;
    let snippet = json!({ "query": ".[0]", "json": "[1,2,3]", "options": ["-r", "-c"] });

    let created = app
        .client
        .post(app.url("/s"))
        .json(&snippet)
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), 200);
    let id = created.json::<Value>().await.unwrap()["id"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(!id.is_empty());
    assert!(!id.ends_with('_'));

    let fetched = app
        .client
        .get(app.url(&format!("/s/{}", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(fetched.status(), 200);
    let body: Value = fetched.json().await.unwrap();
    assert_eq!(body["id"], id.as_str());
    assert_eq!(body["query"], ".[0]");
    assert_eq!(body["json"], "[1,2,3]");
    assert_eq!(body["options"], json!(["-c", "-r"]));

    // Sharing the same content again yields the same identifier.
    let again = app
        .client
        .post(app.url("/s"))
        .json(&snippet)
        .send()
        .await
        .unwrap();
    assert_eq!(again.json::<Value>().await.unwrap()["id"], id.as_str());
    assert_eq!(app.store.len(), 1);

    app.stop().await.unwrap();
}

#[tokio::test]
async fn shared_snippet_renders_for_browsers() {
    let app = common::spawn_app().await;

    let created: Value = app
        .client
        .post(app.url("/s"))
        .json(&json!({ "query": ".name", "json": "{\"name\":\"<b>\"}" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = created["id"].as_str().unwrap();

    let page = app
        .client
        .get(app.url(&format!("/s/{}", id)))
        .header("accept", "text/html")
        .send()
        .await
        .unwrap();
    assert_eq!(page.status(), 200);
    let html = page.text().await.unwrap();
    assert!(html.contains(".name"));
    assert!(!html.contains("<b>"));

    app.stop().await.unwrap();
}

#[tokio::test]
async fn unknown_or_malformed_snippet_is_404() {
    let app = common::spawn_app().await;

    for path in ["/s/doesNotExist123", "/s/not%20valid!"] {
        let response = app.client.get(app.url(path)).send().await.unwrap();
        assert_eq!(response.status(), 404, "{path}");
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"]["kind"], "not_found");
    }

    app.stop().await.unwrap();
}

#[tokio::test]
async fn share_rejects_invalid_content() {
    let app = common::spawn_app().await;

    let response = app
        .client
        .post(app.url("/s"))
        .json(&json!({ "query": ".", "json": "{}", "options": ["-x"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 422);
    assert!(app.store.is_empty());

    app.stop().await.unwrap();
}

#[tokio::test]
async fn snippets_differing_only_at_field_boundaries_get_distinct_ids() {
    let app = common::spawn_app().await;
    let snippets = [
        json!({ "query": ". -c", "json": "{}" }),
        json!({ "query": ". ", "json": "{}", "options": ["-c"] }),
        json!({ "query": ".a", "json": "1" }),
        json!({ "query": "a", "json": "1." }),
    ];

    let mut ids = Vec::new();
    for snippet in &snippets {
        let response = app
            .client
            .post(app.url("/s"))
            .json(snippet)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200, "{snippet}");
        let body: Value = response.json().await.unwrap();
        ids.push(body["id"].as_str().unwrap().to_string());
    }

    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), snippets.len());
    assert_eq!(app.store.len(), snippets.len());

    app.stop().await.unwrap();
}

#[tokio::test]
async fn null_input_snippet_keeps_its_empty_input() {
    let app = common::spawn_app().await;

    let created: Value = app
        .client
        .post(app.url("/s"))
        .json(&json!({ "query": "now", "json": "", "options": ["-n"] }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = created["id"].as_str().unwrap();

    let body: Value = app
        .client
        .get(app.url(&format!("/s/{}", id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["json"], "");
    assert_eq!(body["options"], json!(["-n"]));

    app.stop().await.unwrap();
}

#[tokio::test]
async fn concurrent_evaluations_are_independent() {
    let mut config = common::test_config();
    config.timeouts.request_ms = 1_000;
    let app = common::spawn_app_with(config).await;

    let mut queries = vec!["sleep:60000".to_string(), "runtime error".to_string()];
    queries.extend((0..6).map(|i| format!(".[{}]", i)));

    let calls: Vec<_> = queries
        .into_iter()
        .map(|query| {
            let client = app.client.clone();
            let url = app.url("/jq");
            tokio::spawn(async move {
                let started = std::time::Instant::now();
                let response = client
                    .post(url)
                    .json(&json!({ "query": query, "json": "[0,1,2,3,4,5]" }))
                    .send()
                    .await
                    .unwrap();
                (query, response.status().as_u16(), started.elapsed())
            })
        })
        .collect();

    for call in calls {
        let (query, status, elapsed) = call.await.unwrap();
        match query.as_str() {
            "sleep:60000" => assert_eq!(status, 408),
            "runtime error" => assert_eq!(status, 422),
            _ => {
                assert_eq!(status, 200, "{query}");
                assert!(
                    elapsed < std::time::Duration::from_millis(800),
                    "{query} took {elapsed:?}"
                );
            }
        }
    }

    app.stop().await.unwrap();
}

#[tokio::test]
async fn evaluations_beyond_the_ceiling_wait_for_a_slot() {
    let mut config = common::test_config();
    config.engine.max_concurrency = 1;
    let app = common::spawn_app_with(config).await;

    let blocker = {
        let client = app.client.clone();
        let url = app.url("/jq");
        tokio::spawn(async move {
            client
                .post(url)
                .json(&json!({ "query": "sleep:400", "json": "{}" }))
                .send()
                .await
                .unwrap()
                .status()
        })
    };
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let started = std::time::Instant::now();
    let queued = app
        .client
        .post(app.url("/jq"))
        .json(&json!({ "query": ".", "json": "{}" }))
        .send()
        .await
        .unwrap();
    assert_eq!(queued.status(), 200);
    assert!(started.elapsed() >= std::time::Duration::from_millis(200));
    assert_eq!(blocker.await.unwrap(), 200);

    app.stop().await.unwrap();
}
