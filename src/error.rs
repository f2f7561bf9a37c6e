use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::DbErr;
use serde_json::json;

use crate::services::AllocationError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unprocessable(String),
    #[error("{0}")]
    ServiceUnavailable(String),
    #[error("{0}")]
    Internal(String),
    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::ServiceUnavailable(msg) => {
                tracing::warn!("Service unavailable: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, msg)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            AppError::Database(err) => {
                tracing::error!("Database error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<AllocationError> for AppError {
    fn from(err: AllocationError) -> Self {
        let message = err.to_string();
        match err {
            AllocationError::InvalidInput(_) => AppError::BadRequest(message),
            AllocationError::SeatAlreadyTaken { .. } => AppError::Conflict(message),
            AllocationError::QuotaExceeded { .. } => AppError::Unprocessable(message),
            AllocationError::NotFound => AppError::NotFound(message),
            AllocationError::Forbidden => AppError::Forbidden(message),
            AllocationError::Conflict | AllocationError::Unavailable => {
                AppError::ServiceUnavailable(message)
            }
            AllocationError::Store(err) => AppError::Database(err),
        }
    }
}

// Malformed or unknown fields are invalid input, never a quota rejection
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_errors_map_to_http_status() {
        let cases = [
            (AllocationError::InvalidInput("bad".into()), StatusCode::BAD_REQUEST),
            (AllocationError::SeatAlreadyTaken { seat: 3 }, StatusCode::CONFLICT),
            (AllocationError::QuotaExceeded { limit: 2 }, StatusCode::UNPROCESSABLE_ENTITY),
            (AllocationError::NotFound, StatusCode::NOT_FOUND),
            (AllocationError::Forbidden, StatusCode::FORBIDDEN),
            (AllocationError::Conflict, StatusCode::SERVICE_UNAVAILABLE),
            (AllocationError::Unavailable, StatusCode::SERVICE_UNAVAILABLE),
        ];

        for (err, status) in cases {
            let response = AppError::from(err).into_response();
            assert_eq!(response.status(), status);
        }
    }

    #[test]
    fn test_database_error_is_hidden() {
        let response = AppError::Database(DbErr::Custom("boom".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
