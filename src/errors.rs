use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::services::availability::BookingError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] anyhow::Error),

    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::RoomNotFound => AppError::NotFound("room"),
            BookingError::DateConflict => AppError::Conflict(err.to_string()),
            BookingError::NotOwner => AppError::Forbidden(err.to_string()),
            _ => AppError::Validation(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
        };

        // Storage details stay in the log, not on the wire.
        let body = if let AppError::Database(e) = &self {
            tracing::error!("database error: {e:#}");
            serde_json::json!({ "error": "internal error" })
        } else {
            serde_json::json!({ "error": self.to_string() })
        };

        (status, axum::Json(body)).into_response()
    }
}
