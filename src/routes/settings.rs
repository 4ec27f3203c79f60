use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::response::{json_error, AppError};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SettingsView {
    api_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateSettingsRequest {
    #[serde(default)]
    api_key: String,
    #[serde(default)]
    base_url: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_settings).put(update_settings))
}

/// Single-user readback of the stored scalars, the way the settings form
/// shows what was saved. The key still never appears in any log line.
async fn get_settings(State(state): State<AppState>) -> Response {
    Json(current(&state)).into_response()
}

/// Persists both scalars (empty clears) and swaps the AI client so the next
/// analysis or lookup uses the new credentials.
async fn update_settings(
    State(state): State<AppState>,
    body: Option<Json<UpdateSettingsRequest>>,
) -> Response {
    let Some(Json(body)) = body else {
        return json_error(StatusCode::BAD_REQUEST, "Invalid settings payload").into_response();
    };

    let store = state.store();
    if let Err(error) = store.set_api_key(&body.api_key) {
        return AppError::from(error).into_response();
    }
    if let Err(error) = store.set_base_url(&body.base_url) {
        return AppError::from(error).into_response();
    }

    state.reload_ai_client();
    let client = state.ai_client();
    tracing::info!(
        configured = client.is_configured(),
        base_url = client.base_url(),
        "AI settings updated"
    );

    Json(current(&state)).into_response()
}

fn current(state: &AppState) -> SettingsView {
    let store = state.store();
    SettingsView {
        api_key: store.api_key().unwrap_or_default(),
        base_url: store.base_url().unwrap_or_default(),
    }
}
