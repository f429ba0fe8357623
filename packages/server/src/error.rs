use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use common::storage::StorageError;
use sea_orm::DbErr;

use crate::models::shared::Envelope;

/// Application-level error type.
///
/// Business failures are carried inside the HTTP-200 envelope with their
/// semantic code; only the admin-auth boundary answers with a real 401/403.
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Unauthorized,
    Forbidden,
    StoreUnavailable(String),
    Internal(String),
}

impl AppError {
    pub fn code(&self) -> i32 {
        match self {
            Self::BadRequest(_) => 400,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::StoreUnavailable(_) | Self::Internal(_) => 500,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::OK, msg),
            AppError::NotFound(msg) => (StatusCode::OK, msg),
            AppError::Conflict(msg) => (StatusCode::OK, msg),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Authentication required".to_string(),
            ),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "Access denied".to_string()),
            AppError::StoreUnavailable(detail) => {
                tracing::error!("Object store unavailable: {detail}");
                (StatusCode::OK, "Object store unavailable".to_string())
            }
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {detail}");
                (StatusCode::OK, "An unexpected error occurred".to_string())
            }
        };

        (status, Json(Envelope::<()>::fail(code, message))).into_response()
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AppError::NotFound(format!("Object not found: {key}")),
            StorageError::Unavailable(msg) => AppError::StoreUnavailable(msg),
            other => AppError::Internal(other.to_string()),
        }
    }
}
