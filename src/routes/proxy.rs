use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;

use crate::response::json_error;
use crate::state::AppState;

/// Ceiling on the outbound call so a hung vendor cannot pin the handler.
const RELAY_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelayRequest {
    #[serde(default)]
    endpoint: String,
    #[serde(default)]
    api_key: String,
    #[serde(default)]
    payload: serde_json::Value,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(relay).options(preflight))
}

/// Relays a chat-completions call so the browser never holds the vendor
/// connection itself. The bearer credential goes into the one outbound
/// request and nowhere else: responses carry only upstream data and log
/// lines carry only the target host and status.
async fn relay(State(state): State<AppState>, body: Option<Json<RelayRequest>>) -> Response {
    let Some(Json(body)) = body else {
        return json_error(StatusCode::BAD_REQUEST, "Missing endpoint or apiKey").into_response();
    };
    if body.endpoint.trim().is_empty() || body.api_key.trim().is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "Missing endpoint or apiKey").into_response();
    }

    let host = host_of(&body.endpoint);
    let result = state
        .relay()
        .post(&body.endpoint)
        .timeout(RELAY_TIMEOUT)
        .bearer_auth(&body.api_key)
        .json(&body.payload)
        .send()
        .await;

    let response = match result {
        Ok(response) => response,
        Err(error) => {
            tracing::warn!(%host, %error, "relay request failed");
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
                .into_response();
        }
    };

    let status = response.status();
    if !status.is_success() {
        // A rejection body is not always JSON; an undecodable one collapses
        // to the bare status message.
        let data = response
            .json::<serde_json::Value>()
            .await
            .unwrap_or(serde_json::Value::Null);
        tracing::warn!(%host, status = status.as_u16(), "relay upstream rejected the call");
        let message = upstream_message(&data, status.as_u16());
        return json_error(StatusCode::INTERNAL_SERVER_ERROR, message).into_response();
    }

    let data: serde_json::Value = match response.json().await {
        Ok(value) => value,
        Err(error) => {
            tracing::warn!(%host, status = status.as_u16(), %error, "relay response was not JSON");
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
                .into_response();
        }
    };

    tracing::debug!(%host, status = status.as_u16(), "relay completed");
    Json(data).into_response()
}

/// Bare preflight answer; the CORS layer fills in the headers.
async fn preflight() -> Response {
    StatusCode::OK.into_response()
}

fn upstream_message(data: &serde_json::Value, status: u16) -> String {
    data.get("error")
        .and_then(|error| error.get("message"))
        .and_then(|message| message.as_str())
        .map(|message| message.to_string())
        .unwrap_or_else(|| format!("API Error: {status}"))
}

fn host_of(endpoint: &str) -> String {
    reqwest::Url::parse(endpoint)
        .ok()
        .and_then(|url| url.host_str().map(|h| h.to_string()))
        .unwrap_or_else(|| "invalid-url".to_string())
}
