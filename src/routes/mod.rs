mod health;
mod lessons;
mod proxy;
mod review;
mod settings;
mod transcript;
mod vocab;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::response::json_error;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .nest("/api/proxy", proxy::router())
        .nest("/api/transcript", transcript::router())
        .nest("/api/lessons", lessons::router())
        .nest("/api/vocab", vocab::router())
        .nest("/api/review", review::router())
        .nest("/api/settings", settings::router())
        .fallback(fallback_handler)
        .with_state(state)
}

async fn fallback_handler() -> Response {
    json_error(StatusCode::NOT_FOUND, "Not found").into_response()
}
