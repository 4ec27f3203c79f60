//! Relay behavior against a live stand-in upstream: the bearer credential
//! and payload go out exactly as received, invalid requests never leave the
//! process, and upstream failures come back in the browser-facing error
//! shape without the credential in them.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::routing::post;
use axum::{body::Body, extract::State, Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tower::ServiceExt;

#[derive(Clone, Default)]
struct Upstream {
    hits: Arc<AtomicUsize>,
    last_auth: Arc<Mutex<Option<String>>>,
    last_body: Arc<Mutex<Option<Value>>>,
}

async fn record(
    State(upstream): State<Upstream>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    upstream.hits.fetch_add(1, Ordering::SeqCst);
    *upstream.last_auth.lock() = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    *upstream.last_body.lock() = Some(body);
    Json(json!({ "id": "cmpl-1", "choices": [{ "message": { "content": "ok" } }] }))
}

fn recording_upstream() -> (Router, Upstream) {
    let upstream = Upstream::default();
    let router = Router::new()
        .route("/v1/chat/completions", post(record))
        .with_state(upstream.clone());
    (router, upstream)
}

#[tokio::test]
async fn relay_forwards_token_and_payload_untouched() {
    let (mock, upstream) = recording_upstream();
    let base = common::spawn_server(mock).await;
    let (app, _state) = common::test_app();

    let payload = json!({
        "model": "deepseek-chat",
        "messages": [{ "role": "user", "content": "Bonjour" }],
        "temperature": 0.1
    });
    let response = app
        .oneshot(common::post_json(
            "/api/proxy",
            json!({
                "endpoint": format!("{base}/v1/chat/completions"),
                "apiKey": "sk-relay-secret",
                "payload": payload.clone()
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = common::body_json(response).await;
    assert_eq!(body["id"], "cmpl-1");
    assert_eq!(body["choices"][0]["message"]["content"], "ok");

    assert_eq!(upstream.hits.load(Ordering::SeqCst), 1);
    assert_eq!(
        upstream.last_auth.lock().as_deref(),
        Some("Bearer sk-relay-secret")
    );
    assert_eq!(upstream.last_body.lock().clone().unwrap(), payload);
}

#[tokio::test]
async fn incomplete_requests_never_go_outbound() {
    let (mock, upstream) = recording_upstream();
    let base = common::spawn_server(mock).await;
    let (app, _state) = common::test_app();

    let bad_bodies = [
        json!({}),
        json!({ "endpoint": "", "apiKey": "sk-x" }),
        json!({ "endpoint": format!("{base}/v1/chat/completions"), "apiKey": "  " }),
        json!({ "apiKey": "sk-x" }),
    ];
    for bad in bad_bodies {
        let response = app
            .clone()
            .oneshot(common::post_json("/api/proxy", bad))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = common::body_json(response).await;
        assert_eq!(body["error"], "Missing endpoint or apiKey");
    }

    // No body at all reads the same as an empty one.
    let response = app.oneshot(common::post_empty("/api/proxy")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(upstream.hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn upstream_rejection_surfaces_its_message() {
    let mock = Router::new().route(
        "/v1/chat/completions",
        post(|| async {
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": { "message": "Invalid API key" } })),
            )
        }),
    );
    let base = common::spawn_server(mock).await;
    let (app, _state) = common::test_app();

    let response = app
        .oneshot(common::post_json(
            "/api/proxy",
            json!({
                "endpoint": format!("{base}/v1/chat/completions"),
                "apiKey": "sk-relay-secret",
                "payload": {}
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = common::body_json(response).await;
    assert_eq!(body["error"], "Invalid API key");
}

#[tokio::test]
async fn upstream_rejection_without_a_message_reports_the_status() {
    let mock = Router::new().route(
        "/v1/chat/completions",
        post(|| async {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "unexpected": true })),
            )
        }),
    );
    let base = common::spawn_server(mock).await;
    let (app, _state) = common::test_app();

    let response = app
        .oneshot(common::post_json(
            "/api/proxy",
            json!({
                "endpoint": format!("{base}/v1/chat/completions"),
                "apiKey": "sk-x",
                "payload": {}
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = common::body_json(response).await;
    assert_eq!(body["error"], "API Error: 503");
}

#[tokio::test]
async fn a_plain_text_rejection_falls_back_to_the_status() {
    let mock = Router::new().route(
        "/v1/chat/completions",
        post(|| async { (StatusCode::BAD_GATEWAY, "upstream exploded") }),
    );
    let base = common::spawn_server(mock).await;
    let (app, _state) = common::test_app();

    let response = app
        .oneshot(common::post_json(
            "/api/proxy",
            json!({
                "endpoint": format!("{base}/v1/chat/completions"),
                "apiKey": "sk-hidden",
                "payload": {}
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = common::body_json(response).await;
    assert_eq!(body["error"], "API Error: 502");
}

#[tokio::test]
async fn a_garbled_success_body_is_still_a_500() {
    let mock = Router::new().route(
        "/v1/chat/completions",
        post(|| async { "definitely not json" }),
    );
    let base = common::spawn_server(mock).await;
    let (app, _state) = common::test_app();

    let response = app
        .oneshot(common::post_json(
            "/api/proxy",
            json!({
                "endpoint": format!("{base}/v1/chat/completions"),
                "apiKey": "sk-hidden",
                "payload": {}
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = common::body_json(response).await;
    let message = body["error"].as_str().unwrap();
    assert!(!message.is_empty());
    assert!(!message.contains("sk-hidden"));
}

#[tokio::test]
async fn connection_failures_do_not_leak_the_credential() {
    // Bind and immediately drop a listener so the port refuses connections.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (app, _state) = common::test_app();
    let response = app
        .oneshot(common::post_json(
            "/api/proxy",
            json!({
                "endpoint": format!("http://{addr}/v1/chat/completions"),
                "apiKey": "sk-should-not-appear",
                "payload": {}
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = common::body_json(response).await;
    let message = body["error"].as_str().unwrap();
    assert!(!message.is_empty());
    assert!(!message.contains("sk-should-not-appear"));
}

#[tokio::test]
async fn preflight_is_accepted() {
    let (app, _state) = common::test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/api/proxy")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
