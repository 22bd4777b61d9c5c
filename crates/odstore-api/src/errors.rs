//! JSON error responses for the management routes and rejected batches.
//!
//! Management routes (stores, entity types, health) answer errors as
//! `{"code": …, "message": …}` with the status derived from the code. A
//! `$batch` envelope rejected before execution uses the same shape, with
//! the batch format code (`BATCH_BODY_PARSE_ERROR`, `TOO_MANY_REQUESTS`, …)
//! and status 400. Failures of individual OData resource requests are not
//! `ApiError`s: they are rendered in the OData error format by the domain.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use tracing::error;

use odstore_domain::codes;
use odstore_server::handlers::batch::BatchFormatError;
use odstore_storage::StorageError;

/// Error codes of the management API.
pub mod error_codes {
    // 404 Not Found
    pub const STORE_NOT_FOUND: &str = "store_not_found";
    pub const ENTITY_TYPE_NOT_FOUND: &str = "entity_type_not_found";
    pub const ROUTE_NOT_FOUND: &str = "route_not_found";

    // 400 Bad Request
    pub const VALIDATION_ERROR: &str = "validation_error";

    // 409 Conflict
    pub const ALREADY_EXISTS: &str = "already_exists";

    // 413 Payload Too Large
    pub const PAYLOAD_TOO_LARGE: &str = "payload_too_large";

    // 5xx
    pub const INTERNAL_ERROR: &str = "internal_error";
    pub const SERVICE_UNAVAILABLE: &str = "service_unavailable";
}

/// API error response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn store_not_found(message: impl Into<String>) -> Self {
        Self::new(error_codes::STORE_NOT_FOUND, message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new(error_codes::VALIDATION_ERROR, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(error_codes::ALREADY_EXISTS, message)
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(error_codes::PAYLOAD_TOO_LARGE, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(error_codes::INTERNAL_ERROR, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(error_codes::SERVICE_UNAVAILABLE, message)
    }

    /// The HTTP status for this error's code.
    pub fn status(&self) -> StatusCode {
        use error_codes::*;

        match self.code.as_str() {
            STORE_NOT_FOUND | ENTITY_TYPE_NOT_FOUND | ROUTE_NOT_FOUND => StatusCode::NOT_FOUND,

            VALIDATION_ERROR
            | codes::BATCH_BODY_PARSE_ERROR
            | codes::BATCH_BODY_FORMAT_HEADER_ERROR
            | codes::BATCH_BODY_FORMAT_METHOD_ERROR
            | codes::BATCH_BODY_FORMAT_PATH_ERROR
            | codes::BATCH_BODY_FORMAT_CHANGESET_NEST_ERROR
            | codes::TOO_MANY_REQUESTS
            | codes::BATCH_TOTAL_TOP_COUNT_LIMITATION_EXCEEDED => StatusCode::BAD_REQUEST,

            ALREADY_EXISTS => StatusCode::CONFLICT,
            PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
            SERVICE_UNAVAILABLE => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match &err {
            StorageError::StoreNotFound { .. } => ApiError::store_not_found(err.to_string()),
            StorageError::EntityTypeNotFound { .. } => {
                ApiError::new(error_codes::ENTITY_TYPE_NOT_FOUND, err.to_string())
            }
            StorageError::StoreAlreadyExists { .. }
            | StorageError::EntityTypeAlreadyExists { .. }
            | StorageError::EntityAlreadyExists { .. }
            | StorageError::LinkAlreadyExists(_) => ApiError::conflict(err.to_string()),
            StorageError::InvalidInput { message } => ApiError::validation_error(message.clone()),
            StorageError::Unavailable { .. } => ApiError::service_unavailable(err.to_string()),
            _ => {
                error!(error = %err, "storage error");
                ApiError::internal_error("internal storage error")
            }
        }
    }
}

impl From<BatchFormatError> for ApiError {
    fn from(err: BatchFormatError) -> Self {
        ApiError::new(err.code(), err.to_string())
    }
}

/// Result type for management route handlers.
pub type ApiResult<T> = Result<T, ApiError>;
