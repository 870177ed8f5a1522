use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::jobs::StoreError;
use crate::pipeline::{ErrorKind, PipelineError};
use crate::settings::SettingsError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Notification failed: {0}")]
    Notify(String),

    #[error("Upstream error: {0}")]
    Upstream(String),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => AppError::NotFound(format!("job {id}")),
            StoreError::InvalidTransition { .. } | StoreError::PayloadMismatch(_) => {
                AppError::Conflict(e.to_string())
            }
            StoreError::Unavailable(msg) => AppError::ServiceUnavailable(msg),
        }
    }
}

impl From<PipelineError> for AppError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::InvalidRequest(msg) => AppError::Validation(msg),
            PipelineError::NotFound(id) => AppError::NotFound(format!("job {id}")),
            PipelineError::StoreUnavailable(msg) => AppError::ServiceUnavailable(msg),
            PipelineError::Conflict(msg) => AppError::Conflict(msg),
            PipelineError::NotifierDisabled => AppError::ServiceUnavailable(e.to_string()),
            PipelineError::Notify(inner) => AppError::Notify(inner.to_string()),
            PipelineError::Upstream { kind, message } => match kind {
                ErrorKind::TransientExternal | ErrorKind::DependencyUnavailable => {
                    AppError::ServiceUnavailable(message)
                }
                _ => AppError::Upstream(message),
            },
        }
    }
}

impl From<SettingsError> for AppError {
    fn from(e: SettingsError) -> Self {
        AppError::Validation(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::ServiceUnavailable(msg) => {
                tracing::error!("Service unavailable: {msg}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    msg.clone(),
                )
            }
            AppError::Notify(msg) => {
                tracing::warn!("Notification failed: {msg}");
                (StatusCode::BAD_GATEWAY, "NOTIFY_FAILED", msg.clone())
            }
            AppError::Upstream(msg) => {
                tracing::warn!("Upstream error: {msg}");
                (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", msg.clone())
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
