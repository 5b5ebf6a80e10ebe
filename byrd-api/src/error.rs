use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use byrd_core::{CoreError, FieldError};
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    ValidationError { message: String, fields: Vec<FieldError> },
    TierRestricted(Vec<FieldError>),
    NotFoundError(String),
    ConflictError(String),
    InternalServerError(String),
    Anyhow(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, fields) = match self {
            AppError::ValidationError { message, fields } => (StatusCode::BAD_REQUEST, message, fields),
            AppError::TierRestricted(fields) => (
                StatusCode::FORBIDDEN,
                "Upgrade your membership to use this feature".to_string(),
                fields,
            ),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg, Vec::new()),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg, Vec::new()),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string(), Vec::new())
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string(), Vec::new())
            }
        };

        let body = if fields.is_empty() {
            Json(json!({ "error": error_message }))
        } else {
            Json(json!({ "error": error_message, "fields": fields }))
        };

        (status, body).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(fields) => AppError::ValidationError {
                message: "Validation failed".to_string(),
                fields,
            },
            CoreError::TierRestricted(fields) => AppError::TierRestricted(fields),
            e @ CoreError::InsufficientFunds { .. } => AppError::ValidationError {
                message: e.to_string(),
                fields: Vec::new(),
            },
            e @ (CoreError::NeedsReintegration(_)
            | CoreError::FolderLocked(_)
            | CoreError::InvalidTransition { .. }) => AppError::ConflictError(e.to_string()),
            CoreError::NotFound(what) => AppError::NotFoundError(format!("Not found: {}", what)),
            CoreError::Repository(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Anyhow(err)
    }
}
