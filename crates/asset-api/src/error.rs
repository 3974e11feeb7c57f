//! API error handling
//!
//! Errors render as JSON bodies with a stable identifier.

use std::collections::BTreeMap;

use asset_core::ValidationErrors;
use asset_library::{AssetError, RegistryError, StorageError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// API error types
#[derive(Debug)]
pub enum ApiError {
    NotFound { resource: &'static str, id: String },
    Validation(ValidationErrors),
    BadRequest(String),
    Internal(String),
}

impl ApiError {
    pub fn not_found(resource: &'static str, id: impl std::fmt::Display) -> Self {
        ApiError::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        ApiError::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<BTreeMap<String, Vec<String>>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match self {
            ApiError::NotFound { resource, id } => ErrorBody {
                error: "not_found",
                message: format!("{} with id {} not found", resource, id),
                errors: None,
            },
            ApiError::Validation(errors) => ErrorBody {
                error: "validation_failed",
                message: errors.full_messages().join(", "),
                errors: Some(errors.errors),
            },
            ApiError::BadRequest(message) => ErrorBody {
                error: "bad_request",
                message,
                errors: None,
            },
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "Request failed");
                ErrorBody {
                    error: "internal_error",
                    message,
                    errors: None,
                }
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<AssetError> for ApiError {
    fn from(err: AssetError) -> Self {
        match err {
            AssetError::NotFound(id) => ApiError::not_found("Asset", id),
            AssetError::AttachmentNotFound { asset_id, page_id } => {
                ApiError::not_found("Page attachment", format!("{}/{}", page_id, asset_id))
            }
            AssetError::Validation(errors) => ApiError::Validation(errors),
            AssetError::Registry(e @ RegistryError::UnknownType(_)) => {
                ApiError::bad_request(e.to_string())
            }
            AssetError::Storage(StorageError::NotFound(key)) => ApiError::not_found("File", key),
            AssetError::Storage(e @ StorageError::InvalidPath(_)) => {
                ApiError::bad_request(e.to_string())
            }
            other => ApiError::internal(other.to_string()),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
