//! Error handling for the backend API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use reader_core::CoreError;
use serde::Serialize;
use thiserror::Error;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("{0}")]
    Core(#[from] CoreError),

    #[error("Content error: {0}")]
    Content(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl ApiError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            ApiError::Content(_) => (StatusCode::INTERNAL_SERVER_ERROR, "content_error"),
            ApiError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            ApiError::Migration(_) => (StatusCode::INTERNAL_SERVER_ERROR, "migration_error"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            ApiError::Core(core) => match core {
                CoreError::ContentNotFound { .. }
                | CoreError::ItemNotFound { .. }
                | CoreError::NoContentAvailable => (StatusCode::NOT_FOUND, "content_unavailable"),
                CoreError::NoActiveSession => (StatusCode::NOT_FOUND, "no_active_session"),
                CoreError::SessionAlreadyActive => (StatusCode::CONFLICT, "session_already_active"),
                CoreError::SessionBlocked => (StatusCode::CONFLICT, "session_blocked"),
                CoreError::AwaitingCare => (StatusCode::CONFLICT, "awaiting_care"),
                CoreError::PetDead => (StatusCode::CONFLICT, "pet_dead"),
                CoreError::DailyLimitReached { .. } => {
                    (StatusCode::TOO_MANY_REQUESTS, "daily_limit_reached")
                }
                CoreError::InvalidCareChoice { .. } => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "invalid_care_choice")
                }
                CoreError::UnknownPetType(_) => (StatusCode::BAD_REQUEST, "unknown_pet_type"),
                CoreError::TtsUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "tts_unavailable"),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status_and_kind();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message: self.to_string(),
        });

        (status, body).into_response()
    }
}

/// Result type alias for API operations
pub type Result<T> = std::result::Result<T, ApiError>;
