use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::services::scheduling::BookingError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Booking(#[from] BookingError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Booking(e) => match e {
                BookingError::InvalidTime
                | BookingError::InvalidState(_)
                | BookingError::Validation(_) => StatusCode::BAD_REQUEST,
                BookingError::SlotConflict => StatusCode::CONFLICT,
                BookingError::NotFound => StatusCode::NOT_FOUND,
                BookingError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
        };

        let message = match &self {
            AppError::Booking(BookingError::Store(e)) => {
                tracing::error!(error = %e, "storage failure");
                "internal error".to_string()
            }
            other => other.to_string(),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}
