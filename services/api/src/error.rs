//! Custom error types for the API service

use axum::{
    Json,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::media::MediaError;
use crate::policy::Denial;
use crate::store::StoreError;
use crate::validation::ValidationErrors;

/// Custom error type for the API service
#[derive(Error, Debug)]
pub enum ApiError {
    /// One or more fields failed validation
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// No usable credentials were presented
    #[error("Authentication credentials were not provided or are invalid")]
    Unauthorized,

    /// The caller is known but lacks the required role
    #[error("You do not have permission to perform this action")]
    Forbidden,

    /// The addressed resource does not exist
    #[error("Not found")]
    NotFound,

    /// The verb is not defined for the resource
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Internal server error
    #[error("Internal server error")]
    InternalServerError,

    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Upload error
    #[error("Media error: {0}")]
    Media(#[from] MediaError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Store(StoreError::Conflict { .. }) => StatusCode::BAD_REQUEST,
            ApiError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Store(StoreError::Database(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Media(MediaError::InvalidImage(_)) => StatusCode::BAD_REQUEST,
            ApiError::Media(MediaError::Io(_) | MediaError::Task(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match self {
            ApiError::Validation(errors) => json!({
                "error": "Validation failed",
                "fields": errors,
            }),
            ApiError::Store(StoreError::Conflict { field, message }) => json!({
                "error": "Validation failed",
                "fields": ValidationErrors::single(field, message),
            }),
            ApiError::Media(MediaError::InvalidImage(message)) => json!({
                "error": "Validation failed",
                "fields": ValidationErrors::single("image", message),
            }),
            ApiError::Store(StoreError::NotFound(_)) => json!({"error": "Not found"}),
            ApiError::Store(StoreError::Database(e)) => {
                error!("Database error: {}", e);
                json!({"error": "Database error"})
            }
            ApiError::Media(MediaError::Io(e)) => {
                error!("Failed to store upload: {}", e);
                json!({"error": "Internal server error"})
            }
            ApiError::Media(MediaError::Task(e)) => {
                error!("Failed to decode upload: {}", e);
                json!({"error": "Internal server error"})
            }
            other => json!({"error": other.to_string()}),
        };

        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, header::HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::Validation(errors)
    }
}

impl From<Denial> for ApiError {
    fn from(denial: Denial) -> Self {
        match denial {
            Denial::Unauthenticated => ApiError::Unauthorized,
            Denial::Forbidden => ApiError::Forbidden,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(ValidationErrors::single(
            "non_field_errors",
            rejection.body_text(),
        ))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation(ValidationErrors::single(
            "non_field_errors",
            rejection.body_text(),
        ))
    }
}

impl From<PathRejection> for ApiError {
    fn from(_: PathRejection) -> Self {
        ApiError::NotFound
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::Validation(ValidationErrors::single("image", rejection.body_text()))
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::Validation(ValidationErrors::single("image", err.body_text()))
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;
