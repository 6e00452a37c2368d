//! API Error Types
//!
//! Defines error types for the API layer and implements conversion
//! to HTTP responses with appropriate status codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::auth::AuthError;
use crate::metadata::MetadataError;
use crate::points::StoreError;

/// API error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Request validation failed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing, unknown or expired admin session
    #[error("{0}")]
    Auth(#[from] AuthError),

    /// Point store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Link preview could not be built
    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
    pub request_id: String,
}

/// Error details
#[derive(Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Auth(AuthError::MissingCredentials) => {
                (StatusCode::BAD_REQUEST, "MISSING_CREDENTIALS")
            }
            ApiError::Auth(AuthError::SessionExpired) => {
                (StatusCode::UNAUTHORIZED, "SESSION_EXPIRED")
            }
            ApiError::Auth(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::Store(e) => match e {
                StoreError::NotFound { .. } => (StatusCode::NOT_FOUND, "POINT_NOT_FOUND"),
                StoreError::InvalidData(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
                StoreError::PermissionDenied => (StatusCode::FORBIDDEN, "PERMISSION_DENIED"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR"),
            },
            ApiError::Metadata(_) => (StatusCode::INTERNAL_SERVER_ERROR, "METADATA_ERROR"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            ApiError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let request_id = uuid::Uuid::new_v4().to_string();

        if status.is_server_error() {
            tracing::error!(
                request_id = %request_id,
                error_code = %code,
                error_message = %self,
                "API error occurred"
            );
        } else {
            tracing::warn!(
                request_id = %request_id,
                error_code = %code,
                error_message = %self,
                "API request rejected"
            );
        }

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: self.to_string(),
            },
            request_id,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let status = |e: ApiError| e.into_response().status();

        assert_eq!(status(ApiError::Validation("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status(AuthError::Unauthenticated.into()), StatusCode::UNAUTHORIZED);
        assert_eq!(status(AuthError::MissingCredentials.into()), StatusCode::BAD_REQUEST);
        assert_eq!(
            status(
                StoreError::NotFound {
                    journey: "camino".into(),
                    id: "p1".into()
                }
                .into()
            ),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(StoreError::InvalidData("lat".into()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(StoreError::Database("locked".into()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
