use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde::Deserialize;

use crate::models::VocabCard;
use crate::response::{json_error, AppError};
use crate::state::AppState;
use crate::store::allocate_id;

/// Same key mix the cards themselves use: the explanation fields keep the
/// vendor schema's snake_case, the app-added references are camelCase.
#[derive(Debug, Deserialize)]
struct CreateCardRequest {
    #[serde(default)]
    word: String,
    #[serde(default)]
    meaning: String,
    #[serde(default)]
    pronunciation: String,
    #[serde(default)]
    grammar_type: String,
    #[serde(default)]
    note: String,
    #[serde(rename = "contextSentence", default)]
    context_sentence: String,
    #[serde(rename = "lessonId", default)]
    lesson_id: Option<i64>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", delete(remove))
}

async fn list(State(state): State<AppState>) -> Response {
    Json(state.store().vocab()).into_response()
}

/// Saves a confirmed word lookup as a flashcard. The server owns id,
/// timestamp and the review fields; the client only sends what it saw.
async fn create(
    State(state): State<AppState>,
    body: Option<Json<CreateCardRequest>>,
) -> Response {
    let Some(Json(body)) = body else {
        return json_error(StatusCode::BAD_REQUEST, "Missing word").into_response();
    };
    if body.word.trim().is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "Missing word").into_response();
    }

    let now_ms = chrono::Utc::now().timestamp_millis();
    let created = state.store().update_vocab(move |cards| {
        let id = allocate_id(cards.iter().map(|card| card.id), now_ms);
        let card = VocabCard {
            id,
            word: body.word,
            meaning: body.meaning,
            pronunciation: body.pronunciation,
            grammar_type: body.grammar_type,
            note: body.note,
            context_sentence: body.context_sentence,
            lesson_id: body.lesson_id,
            timestamp: now_ms,
            review_stage: 0,
            last_reviewed_at: None,
        };
        cards.push(card.clone());
        card
    });

    match created {
        Ok(card) => Json(card).into_response(),
        Err(error) => AppError::from(error).into_response(),
    }
}

/// Deletes a card from storage and expels it from any active review queue
/// in the same lock scope, so the live session never shows a card that no
/// longer exists.
async fn remove(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Ok(id) = id.parse::<i64>() else {
        return json_error(StatusCode::NOT_FOUND, "Card not found").into_response();
    };

    let review = state.review();
    let mut slot = review.lock();

    let removed = state.store().update_vocab(|cards| {
        let before = cards.len();
        cards.retain(|card| card.id != id);
        cards.len() != before
    });

    match removed {
        Ok(true) => {
            if let Some(session) = slot.as_mut() {
                session.remove_by_id(id);
                if session.is_empty() {
                    *slot = None;
                }
            }
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(false) => json_error(StatusCode::NOT_FOUND, "Card not found").into_response(),
        Err(error) => AppError::from(error).into_response(),
    }
}
