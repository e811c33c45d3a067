use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::JobValidationError;
use crate::screening::BatchError;
use crate::store::StoreError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<JobValidationError> for AppError {
    fn from(e: JobValidationError) -> Self {
        AppError::Validation(e.to_string())
    }
}

impl From<MultipartError> for AppError {
    fn from(e: MultipartError) -> Self {
        AppError::Validation(format!("invalid multipart body: {e}"))
    }
}

impl From<BatchError> for AppError {
    fn from(e: BatchError) -> Self {
        match e {
            BatchError::InvalidJob(e) => e.into(),
            BatchError::NoFiles => AppError::Validation("at least one file is required".into()),
            BatchError::NoJobs => AppError::Validation("there are no active jobs".into()),
            BatchError::Store(e) => AppError::Store(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Store(StoreError::Conflict { table, key }) => (
                StatusCode::CONFLICT,
                "CONFLICT",
                format!("{table} already has '{key}'"),
            ),
            AppError::Store(StoreError::PartialDelete { counts, source }) => {
                tracing::error!("Partial delete ({counts}): {source}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "PARTIAL_DELETE",
                    format!("deletion stopped midway; removed {counts}"),
                )
            }
            AppError::Store(e) => {
                tracing::error!("Store error: {e}");
                (
                    StatusCode::BAD_GATEWAY,
                    "STORE_ERROR",
                    "A storage error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
