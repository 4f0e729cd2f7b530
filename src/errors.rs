use crate::services::backfill::BackfillError;
use crate::services::items::PipelineError;
use crate::services::object_store::StoreError;
use crate::services::upload_intent::UploadIntentError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        let status = match &err {
            StoreError::ObjectNotFound(_) => StatusCode::NOT_FOUND,
            StoreError::SignatureRejected { .. } => StatusCode::FORBIDDEN,
            StoreError::InvalidKey(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        AppError::new(status, err.to_string())
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        let status = match &err {
            PipelineError::ItemNotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        AppError::new(status, err.to_string())
    }
}

impl From<BackfillError> for AppError {
    fn from(err: BackfillError) -> Self {
        match err {
            // caller-contract violation, surfaced with the underlying message
            BackfillError::NotObjectItem(_) => AppError::internal(err.to_string()),
            BackfillError::Store(inner) => inner.into(),
            BackfillError::Pipeline(inner) => inner.into(),
        }
    }
}

impl From<UploadIntentError> for AppError {
    fn from(err: UploadIntentError) -> Self {
        match err {
            UploadIntentError::Pipeline(inner) => inner.into(),
            UploadIntentError::Store(inner) => inner.into(),
        }
    }
}
