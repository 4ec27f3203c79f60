use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::response::{json_error, AppError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct TranscriptRequest {
    #[serde(default)]
    url: String,
}

#[derive(Debug, Serialize)]
struct TranscriptResponse {
    text: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(fetch))
}

async fn fetch(State(state): State<AppState>, body: Option<Json<TranscriptRequest>>) -> Response {
    let Some(Json(body)) = body else {
        return json_error(StatusCode::BAD_REQUEST, "Missing YouTube URL").into_response();
    };
    if body.url.trim().is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "Missing YouTube URL").into_response();
    }

    match state.transcripts().fetch_french(&body.url).await {
        Ok(text) => Json(TranscriptResponse { text }).into_response(),
        Err(error) => AppError::from(error).into_response(),
    }
}
