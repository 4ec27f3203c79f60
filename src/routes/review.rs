use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::models::VocabCard;
use crate::response::{json_error, AppError};
use crate::review::leitner::Recall;
use crate::review::{Advance, ReviewSession, StartMode};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct StartRequest {
    mode: StartMode,
}

#[derive(Debug, Deserialize)]
struct GradeRequest {
    remembered: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MenuView {
    state: &'static str,
    total_words: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionView {
    state: &'static str,
    mode: StartMode,
    index: usize,
    total: usize,
    flipped: bool,
    card: CardFace,
    #[serde(skip_serializing_if = "Option::is_none")]
    completed: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CardFace {
    id: i64,
    word: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    back: Option<CardBack>,
}

/// Key mix mirrors the stored card: vendor-schema fields in snake_case,
/// app-added fields in camelCase.
#[derive(Debug, Serialize)]
struct CardBack {
    meaning: String,
    pronunciation: String,
    grammar_type: String,
    note: String,
    #[serde(rename = "contextSentence")]
    context_sentence: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(view))
        .route("/start", post(start))
        .route("/flip", post(flip))
        .route("/advance", post(advance))
        .route("/grade", post(grade))
        .route("/finish", post(finish))
        .route("/exit", post(exit))
}

async fn view(State(state): State<AppState>) -> Response {
    let review = state.review();
    let slot = review.lock();
    match slot.as_ref() {
        Some(session) => session_view(session, None),
        None => menu_view(state.store().vocab().len()),
    }
}

/// Builds the card queue and enters the session. An empty selection is a
/// no-op: the machine stays on the menu. A second start while a session is
/// live is rejected; the single slot is never silently replaced.
async fn start(State(state): State<AppState>, body: Option<Json<StartRequest>>) -> Response {
    let Some(Json(body)) = body else {
        return json_error(StatusCode::BAD_REQUEST, "Missing review mode").into_response();
    };

    let review = state.review();
    let mut slot = review.lock();
    if slot.is_some() {
        return json_error(StatusCode::CONFLICT, "A review session is already active")
            .into_response();
    }

    let cards = state.store().vocab();
    let total = cards.len();
    let now_ms = chrono::Utc::now().timestamp_millis();
    let rng = state.rng();
    let started = {
        let mut rng = rng.lock();
        ReviewSession::start(body.mode, cards, now_ms, &mut *rng)
    };

    match started {
        Some(session) => {
            let response = session_view(&session, None);
            *slot = Some(session);
            response
        }
        None => menu_view(total),
    }
}

async fn flip(State(state): State<AppState>) -> Response {
    let review = state.review();
    let mut slot = review.lock();
    let Some(session) = slot.as_mut() else {
        return json_error(StatusCode::BAD_REQUEST, "No active review session").into_response();
    };
    session.flip();
    session_view(session, None)
}

async fn advance(State(state): State<AppState>) -> Response {
    let review = state.review();
    let mut slot = review.lock();
    let Some(session) = slot.as_mut() else {
        return json_error(StatusCode::BAD_REQUEST, "No active review session").into_response();
    };
    let outcome = session.advance();
    session_view(session, Some(outcome == Advance::Exhausted))
}

/// Leitner grade: promotes or demotes the current card, writes the new
/// stage through to storage, then advances like the plain next button.
async fn grade(State(state): State<AppState>, body: Option<Json<GradeRequest>>) -> Response {
    let Some(Json(body)) = body else {
        return json_error(StatusCode::BAD_REQUEST, "Missing remembered flag").into_response();
    };
    let recall = if body.remembered {
        Recall::Remembered
    } else {
        Recall::Forgot
    };
    let now_ms = chrono::Utc::now().timestamp_millis();

    let review = state.review();
    let mut slot = review.lock();
    let Some(session) = slot.as_mut() else {
        return json_error(StatusCode::BAD_REQUEST, "No active review session").into_response();
    };
    let Some((updated, outcome)) = session.grade_current(recall, now_ms) else {
        return json_error(StatusCode::BAD_REQUEST, "No active review session").into_response();
    };

    let write = state.store().update_vocab(|cards| {
        if let Some(card) = cards.iter_mut().find(|card| card.id == updated.id) {
            card.review_stage = updated.review_stage;
            card.last_reviewed_at = updated.last_reviewed_at;
        }
    });
    if let Err(error) = write {
        return AppError::from(error).into_response();
    }

    session_view(session, Some(outcome == Advance::Exhausted))
}

/// Confirms a finished run and returns to the menu.
async fn finish(State(state): State<AppState>) -> Response {
    let review = state.review();
    let mut slot = review.lock();
    if slot.take().is_none() {
        return json_error(StatusCode::BAD_REQUEST, "No active review session").into_response();
    }
    drop(slot);
    menu_view(state.store().vocab().len())
}

/// Abandons whatever is running. Safe to call from the menu too.
async fn exit(State(state): State<AppState>) -> Response {
    let review = state.review();
    let mut slot = review.lock();
    slot.take();
    drop(slot);
    menu_view(state.store().vocab().len())
}

fn menu_view(total_words: usize) -> Response {
    Json(MenuView {
        state: "menu",
        total_words,
    })
    .into_response()
}

fn session_view(session: &ReviewSession, completed: Option<bool>) -> Response {
    let Some(card) = session.current() else {
        tracing::error!("review session has no current card");
        return json_error(StatusCode::INTERNAL_SERVER_ERROR, "服务器内部错误").into_response();
    };
    Json(SessionView {
        state: "session",
        mode: session.mode(),
        index: session.index(),
        total: session.len(),
        flipped: session.flipped(),
        card: card_face(card, session.flipped()),
        completed,
    })
    .into_response()
}

/// Face-down cards expose only the word; the back appears on flip, same as
/// the flashcard UI this mirrors.
fn card_face(card: &VocabCard, flipped: bool) -> CardFace {
    CardFace {
        id: card.id,
        word: card.word.clone(),
        back: flipped.then(|| CardBack {
            meaning: card.meaning.clone(),
            pronunciation: card.pronunciation.clone(),
            grammar_type: card.grammar_type.clone(),
            note: card.note.clone(),
            context_sentence: card.context_sentence.clone(),
        }),
    }
}
