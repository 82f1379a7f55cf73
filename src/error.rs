use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("driver order is already delivered")]
    OrderDelivered,

    #[error("driver order is already dispatched and can only move to delivered")]
    OrderDispatched,

    #[error("driver order was skipped or cancelled")]
    OrderSkipped,

    #[error("driver is already assigned to this order")]
    DuplicateAssignment,

    #[error("already confirmed: {0}")]
    AlreadyConfirmed(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("code is invalid or expired")]
    InvalidOrExpired,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidState(_) => "invalid_state",
            AppError::OrderDelivered => "order_delivered",
            AppError::OrderDispatched => "order_dispatched",
            AppError::OrderSkipped => "order_skipped",
            AppError::DuplicateAssignment => "duplicate_assignment",
            AppError::AlreadyConfirmed(_) => "already_confirmed",
            AppError::Conflict(_) => "conflict",
            AppError::NotFound(_) => "not_found",
            AppError::InvalidOrExpired => "invalid_or_expired",
            AppError::Validation(_) => "validation_error",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::Storage(_) => "storage_error",
            AppError::Internal(_) => "internal",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidState(_)
            | AppError::OrderDelivered
            | AppError::OrderDispatched
            | AppError::OrderSkipped
            | AppError::DuplicateAssignment
            | AppError::AlreadyConfirmed(_)
            | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidOrExpired | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Storage(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.to_string(),
            "kind": self.kind(),
        }));

        (self.status_code(), body).into_response()
    }
}
