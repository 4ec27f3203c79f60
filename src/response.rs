use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::services::ai::AiError;
use crate::services::transcript::TranscriptError;
use crate::store::StoreError;

/// The one failure shape every endpoint speaks, matching what the browser
/// shell expects from the original serverless functions.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct AppError {
    status: StatusCode,
    message: String,
    is_operational: bool,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::NOT_FOUND, message)
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
            is_operational: false,
        }
    }

    fn operational(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            is_operational: true,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = if self.is_operational {
            self.message
        } else {
            "服务器内部错误".to_string()
        };
        (self.status, Json(ErrorBody { error: message })).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(error: StoreError) -> Self {
        tracing::error!(%error, "store operation failed");
        Self::internal(error.to_string())
    }
}

impl From<AiError> for AppError {
    fn from(error: AiError) -> Self {
        match error {
            AiError::NotConfigured => Self::bad_request(error.to_string()),
            AiError::Timeout
            | AiError::Upstream(_)
            | AiError::BadFormat
            | AiError::Request(_) => Self::upstream(error.to_string()),
        }
    }
}

impl From<TranscriptError> for AppError {
    fn from(error: TranscriptError) -> Self {
        Self::upstream(error.to_string())
    }
}

pub fn json_error(status: StatusCode, message: impl Into<String>) -> AppError {
    AppError::operational(status, message)
}
