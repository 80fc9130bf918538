use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use seatline_core::{ConfirmError, HoldError, LockStoreError, PaymentError, StoreError};
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    ValidationError(String),
    NotFoundError(String),
    ConflictError(String),
    ServiceUnavailable(String),
    Anyhow(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::ServiceUnavailable(msg) => {
                tracing::warn!("Service unavailable: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, "Service temporarily unavailable, retry".to_string())
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::Anyhow(err.into())
    }
}

// The blanket conversion above covers every std error, so engine errors are
// mapped through these functions instead of `From`.

pub fn store_error(err: StoreError) -> AppError {
    if err.is_retryable() {
        AppError::ServiceUnavailable(err.to_string())
    } else {
        AppError::from(err)
    }
}

pub fn hold_error(err: HoldError) -> AppError {
    match err {
        HoldError::InvalidRequest(msg) => AppError::ValidationError(msg),
        HoldError::Store(e @ LockStoreError::Unavailable(_)) => AppError::ServiceUnavailable(e.to_string()),
        HoldError::Store(e) => AppError::from(e),
    }
}

pub fn confirm_error(err: ConfirmError) -> AppError {
    match err {
        ConfirmError::SeatNotFound { .. } => AppError::NotFoundError("seat not found".to_string()),
        ConfirmError::SeatAlreadyBooked { .. } => AppError::ConflictError("seat already booked".to_string()),
        ConfirmError::Store(e) => store_error(e),
    }
}

pub fn payment_error(err: PaymentError) -> AppError {
    match err {
        PaymentError::InvalidRequest(msg) => AppError::ValidationError(msg),
        PaymentError::BookingNotFound(id) => AppError::NotFoundError(format!("booking {} not found", id)),
        PaymentError::Store(e) => store_error(e),
    }
}
