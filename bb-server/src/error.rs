//! HTTP error type for bb-server

use axum::{
    extract::multipart::MultipartRejection,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::providers::ProviderError;
use crate::storage::StorageError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Missing or invalid credentials (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Resource not found or owned by someone else (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Conflict (409), e.g. duplicate folder path
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Upload larger than max_upload_bytes (413)
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Upstream generation provider failed (502)
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// bb-common error, mapped by variant
    #[error(transparent)]
    Common(#[from] bb_common::Error),
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Common(bb_common::Error::Database(err))
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => ApiError::NotFound(format!("stored object {}", key)),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    fn parts(self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", msg)
            }
            ApiError::Provider(err) if err.is_client_error() => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", err.to_string())
            }
            ApiError::Provider(err) => (StatusCode::BAD_GATEWAY, "PROVIDER_ERROR", err.to_string()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Common(err) => match err {
                bb_common::Error::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
                bb_common::Error::InvalidInput(msg) => {
                    (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg)
                }
                bb_common::Error::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
                other => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    other.to_string(),
                ),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = self.parts();

        if status.is_server_error() {
            error!(code = error_code, "{}", message);
        }

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_errors_map_by_variant() {
        let (status, code, _) =
            ApiError::from(bb_common::Error::NotFound("project".into())).parts();
        assert_eq!((status, code), (StatusCode::NOT_FOUND, "NOT_FOUND"));

        let (status, _, _) = ApiError::from(bb_common::Error::Conflict("dup".into())).parts();
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _, _) = ApiError::from(bb_common::Error::InvalidInput("bad".into())).parts();
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, code, _) = ApiError::from(bb_common::Error::Config("x".into())).parts();
        assert_eq!((status, code), (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"));
    }

    #[test]
    fn test_provider_error_is_bad_gateway() {
        let (status, code, message) =
            ApiError::from(ProviderError::Api { status: 422, message: "invalid version".into() })
                .parts();
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(code, "PROVIDER_ERROR");
        assert!(message.contains("invalid version"));
    }

    #[test]
    fn test_too_large_status() {
        let (status, _, _) = ApiError::PayloadTooLarge("10 MiB".into()).parts();
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }
}
