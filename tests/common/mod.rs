//! Shared fixtures for the HTTP tests: an app over an in-memory store with
//! a seeded RNG, JSON request builders, and small stand-in servers for the
//! chat-completions vendor and the video site.

#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::extract::Path;
use axum::http::{header, Method, Request};
use axum::response::{Html, Response};
use axum::{Json, Router};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::Value;

use creme_backend::models::VocabCard;
use creme_backend::services::transcript::TranscriptFetcher;
use creme_backend::state::AppState;
use creme_backend::store::Store;

const RNG_SEED: u64 = 7;

/// State over a fresh in-memory store. The RNG is seeded so shuffled review
/// queues come out the same on every run.
pub fn test_state() -> AppState {
    AppState::new(Store::in_memory()).with_rng(StdRng::seed_from_u64(RNG_SEED))
}

pub fn test_app() -> (Router, AppState) {
    let state = test_state();
    (creme_backend::app(state.clone()), state)
}

/// Same app, with transcript lookups pointed at a stand-in video site.
pub fn test_app_with_watch_base(base_url: &str) -> (Router, AppState) {
    let state = test_state().with_transcripts(TranscriptFetcher::with_base_url(base_url));
    (creme_backend::app(state.clone()), state)
}

/// Points the stored AI settings at `base_url` and swaps the live client.
pub fn configure_vendor(state: &AppState, base_url: &str) {
    state.store().set_api_key("sk-test").unwrap();
    state.store().set_base_url(base_url).unwrap();
    state.reload_ai_client();
}

/// A stage-zero card for seeding decks.
pub fn card(id: i64, word: &str) -> VocabCard {
    VocabCard {
        id,
        word: word.to_string(),
        meaning: format!("{word} 的意思"),
        pronunciation: format!("/{word}/"),
        grammar_type: "n.".to_string(),
        note: String::new(),
        context_sentence: format!("Voilà {word}."),
        lesson_id: None,
        timestamp: 1_700_000_000_000 + id,
        review_stage: 0,
        last_reviewed_at: None,
    }
}

pub fn seed_cards(state: &AppState, n: i64) {
    state
        .store()
        .update_vocab(|cards| {
            for i in 1..=n {
                cards.push(card(i, &format!("mot{i}")));
            }
        })
        .unwrap();
}

// ==================== Requests ====================

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn post_json(uri: &str, body: Value) -> Request<Body> {
    json_request(Method::POST, uri, body)
}

pub fn put_json(uri: &str, body: Value) -> Request<Body> {
    json_request(Method::PUT, uri, body)
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// ==================== Stand-in servers ====================

/// Serves `router` on an ephemeral port for the rest of the test process;
/// returns the base URL.
pub async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    base
}

/// A chat-completions vendor that answers every call with `content` as the
/// assistant message.
pub fn vendor_returning(content: impl Into<String>) -> Router {
    let content = content.into();
    Router::new().route(
        "/v1/chat/completions",
        axum::routing::post(move || {
            let content = content.clone();
            async move {
                Json(serde_json::json!({
                    "id": "chatcmpl-test",
                    "choices": [{ "message": { "role": "assistant", "content": content } }]
                }))
            }
        }),
    )
}

/// Stands in for the video site. `/watch` lists one caption track per entry
/// in `codes`, each pointing back at this server's `/timedtext/{code}`,
/// which serves a two-line transcript naming its code. Tracks listed in
/// `empty_codes` serve a document with no text in it.
pub async fn spawn_watch_site(codes: &[&str], empty_codes: &[&str]) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());

    let html = watch_page(&base, codes);
    let empty: Vec<String> = empty_codes.iter().map(|c| c.to_string()).collect();
    let router = Router::new()
        .route(
            "/watch",
            axum::routing::get(move || {
                let html = html.clone();
                async move { Html(html) }
            }),
        )
        .route(
            "/timedtext/:code",
            axum::routing::get(move |Path(code): Path<String>| {
                let empty = empty.clone();
                async move {
                    if empty.contains(&code) {
                        "<transcript></transcript>".to_string()
                    } else {
                        format!(
                            "<transcript><text start=\"0\" dur=\"2\">Piste {code}</text>\
                             <text start=\"2\" dur=\"2\">ligne deux</text></transcript>"
                        )
                    }
                }
            }),
        );

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    base
}

fn watch_page(base: &str, codes: &[&str]) -> String {
    let tracks: Vec<String> = codes
        .iter()
        .map(|code| {
            format!(
                r#"{{"baseUrl":"{base}/timedtext/{code}","languageCode":"{code}","name":{{"simpleText":"{code}"}}}}"#
            )
        })
        .collect();
    format!(
        r#"<html><script>var ytInitialPlayerResponse = {{"captions":{{"playerCaptionsTracklistRenderer":{{"captionTracks":[{tracks}]}}}},"videoDetails":{{"videoId":"test"}}}};</script></html>"#,
        tracks = tracks.join(",")
    )
}
