use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::models::{Lesson, WordExplanation};
use crate::response::{json_error, AppError};
use crate::state::AppState;
use crate::store::allocate_id;

/// Tokens taken on each side of the tapped word when building the rough
/// context for a lookup.
const CONTEXT_RADIUS: usize = 40;

#[derive(Debug, Deserialize)]
struct CreateLessonRequest {
    #[serde(default)]
    title: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupRequest {
    word_index: usize,
}

#[derive(Debug, Serialize)]
struct LookupResponse {
    result: Option<WordExplanation>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(get_one).delete(remove))
        .route("/:id/regenerate", post(regenerate))
        .route("/:id/lookup", post(lookup))
}

async fn list(State(state): State<AppState>) -> Response {
    Json(state.store().lessons()).into_response()
}

/// Creates a lesson from pasted text or a YouTube URL. A URL goes through
/// the transcript fetcher first; either way the text is analyzed before
/// anything is persisted, so a failed analysis leaves no half-made lesson.
async fn create(
    State(state): State<AppState>,
    body: Option<Json<CreateLessonRequest>>,
) -> Response {
    let Some(Json(body)) = body else {
        return json_error(StatusCode::BAD_REQUEST, "Missing lesson text or YouTube URL")
            .into_response();
    };

    let text = if !body.url.trim().is_empty() {
        match state.transcripts().fetch_french(&body.url).await {
            Ok(text) => text,
            Err(error) => return AppError::from(error).into_response(),
        }
    } else {
        if body.text.trim().is_empty() {
            return json_error(StatusCode::BAD_REQUEST, "Missing lesson text or YouTube URL")
                .into_response();
        }
        body.text.clone()
    };

    let analysis = match state.ai_client().analyze_text(&text).await {
        Ok(analysis) => analysis,
        Err(error) => return AppError::from(error).into_response(),
    };

    let now = chrono::Utc::now();
    let title = body.title.trim().to_string();
    let created = state.store().update_lessons(move |lessons| {
        let id = allocate_id(lessons.iter().map(|lesson| lesson.id), now.timestamp_millis());
        let title = if title.is_empty() {
            format!("Lesson {}", lessons.len() + 1)
        } else {
            title
        };
        let lesson = Lesson {
            id,
            title,
            text,
            analysis: Some(analysis),
            date: now.format("%d/%m/%Y").to_string(),
        };
        lessons.insert(0, lesson.clone());
        lesson
    });

    match created {
        Ok(lesson) => Json(lesson).into_response(),
        Err(error) => AppError::from(error).into_response(),
    }
}

async fn get_one(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Some(id) = parse_id(&id) else {
        return json_error(StatusCode::NOT_FOUND, "Lesson not found").into_response();
    };
    match state.store().lessons().into_iter().find(|lesson| lesson.id == id) {
        Some(lesson) => Json(lesson).into_response(),
        None => json_error(StatusCode::NOT_FOUND, "Lesson not found").into_response(),
    }
}

async fn remove(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Some(id) = parse_id(&id) else {
        return json_error(StatusCode::NOT_FOUND, "Lesson not found").into_response();
    };
    let removed = state.store().update_lessons(|lessons| {
        let before = lessons.len();
        lessons.retain(|lesson| lesson.id != id);
        lessons.len() != before
    });
    match removed {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => json_error(StatusCode::NOT_FOUND, "Lesson not found").into_response(),
        Err(error) => AppError::from(error).into_response(),
    }
}

/// Re-runs the analysis over the stored text and replaces the lesson's
/// `analysis`. The only mutation a lesson ever sees.
async fn regenerate(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Some(id) = parse_id(&id) else {
        return json_error(StatusCode::NOT_FOUND, "Lesson not found").into_response();
    };
    let Some(lesson) = state.store().lessons().into_iter().find(|lesson| lesson.id == id) else {
        return json_error(StatusCode::NOT_FOUND, "Lesson not found").into_response();
    };

    let analysis = match state.ai_client().analyze_text(&lesson.text).await {
        Ok(analysis) => analysis,
        Err(error) => return AppError::from(error).into_response(),
    };

    let updated = state.store().update_lessons(move |lessons| {
        let slot = lessons.iter_mut().find(|lesson| lesson.id == id)?;
        slot.analysis = Some(analysis);
        Some(slot.clone())
    });

    match updated {
        Ok(Some(lesson)) => Json(lesson).into_response(),
        Ok(None) => json_error(StatusCode::NOT_FOUND, "Lesson not found").into_response(),
        Err(error) => AppError::from(error).into_response(),
    }
}

/// Explains the tapped word inside its surrounding context. A failed lookup
/// is a displayable no-result, never an error response.
async fn lookup(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<LookupRequest>>,
) -> Response {
    let Some(id) = parse_id(&id) else {
        return json_error(StatusCode::NOT_FOUND, "Lesson not found").into_response();
    };
    let Some(Json(body)) = body else {
        return json_error(StatusCode::BAD_REQUEST, "Missing wordIndex").into_response();
    };
    let Some(lesson) = state.store().lessons().into_iter().find(|lesson| lesson.id == id) else {
        return json_error(StatusCode::NOT_FOUND, "Lesson not found").into_response();
    };

    // Same token model as the reading view: split on single spaces, so the
    // indices the client renders are the indices the server slices.
    let words: Vec<&str> = lesson.text.split(' ').collect();
    let Some(word) = words.get(body.word_index).copied() else {
        return json_error(StatusCode::BAD_REQUEST, "wordIndex out of range").into_response();
    };
    let context = context_window(&words, body.word_index);

    let result = state.ai_client().explain_word(word, &context).await;
    Json(LookupResponse { result }).into_response()
}

fn parse_id(raw: &str) -> Option<i64> {
    raw.parse().ok()
}

fn context_window(words: &[&str], index: usize) -> String {
    let start = index.saturating_sub(CONTEXT_RADIUS);
    let end = (index + CONTEXT_RADIUS + 1).min(words.len());
    words[start..end].join(" ")
}
