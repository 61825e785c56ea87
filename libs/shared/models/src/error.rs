use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// HTTP-facing error. Every variant carries a machine-readable code and a
/// human message; `Internal` keeps its detail for the server log only.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {1}")]
    Auth(&'static str, String),

    #[error("Forbidden: {1}")]
    Forbidden(&'static str, String),

    #[error("Not Found: {1}")]
    NotFound(&'static str, String),

    #[error("Validation error: {1}")]
    Validation(&'static str, String),

    #[error("Conflict: {1}")]
    Conflict(&'static str, String),

    #[error("Policy violation: {1}")]
    Policy(&'static str, String),

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        AppError::Auth("UNAUTHORIZED", message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        AppError::Forbidden("FORBIDDEN", message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation("VALIDATION_ERROR", message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Auth(..) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(..) => StatusCode::FORBIDDEN,
            AppError::NotFound(..) => StatusCode::NOT_FOUND,
            AppError::Validation(..) => StatusCode::BAD_REQUEST,
            AppError::Conflict(..) => StatusCode::CONFLICT,
            AppError::Policy(..) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Auth(code, _)
            | AppError::Forbidden(code, _)
            | AppError::NotFound(code, _)
            | AppError::Validation(code, _)
            | AppError::Conflict(code, _)
            | AppError::Policy(code, _) => code,
            AppError::Internal(_) => "INTERNAL",
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let message = match &self {
            AppError::Internal(detail) => {
                tracing::error!("Error: {}: {}", status, detail);
                "An unexpected error occurred".to_string()
            }
            AppError::Auth(_, msg)
            | AppError::Forbidden(_, msg)
            | AppError::NotFound(_, msg)
            | AppError::Validation(_, msg)
            | AppError::Conflict(_, msg)
            | AppError::Policy(_, msg) => {
                tracing::debug!("Rejected with {} {}: {}", status, code, msg);
                msg.clone()
            }
        };

        let body = Json(json!({
            "success": false,
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}
