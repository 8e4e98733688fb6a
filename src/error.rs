use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;
use validator::{ValidationError, ValidationErrors};

/// AppError
///
/// Every failure a handler can surface. Out-of-scope records are reported as
/// `NotFound`, exactly like records that do not exist at all.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Resource not found: {0}")]
    NotFound(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationErrors),
    #[error("Mail delivery failed: {0}")]
    Mail(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(entity: &str) -> Self {
        AppError::NotFound(format!("{entity} not found"))
    }

    /// Builds a validation failure for a single field, the way form validation
    /// reports a bad choice (e.g. an agent from another organization).
    pub fn invalid_field(field: &'static str, code: &'static str, message: &'static str) -> Self {
        let mut errors = ValidationErrors::new();
        errors.add(field, ValidationError::new(code).with_message(message.into()));
        AppError::Validation(errors)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Database(e) => match database_error_code(e).as_deref() {
                // 23505 = unique_violation
                Some("23505") => StatusCode::CONFLICT,
                // 23503 = foreign_key_violation
                Some("23503") => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Mail(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn database_error_code(e: &sqlx::Error) -> Option<String> {
    e.as_database_error()
        .and_then(|db_err| db_err.code())
        .map(|code| code.into_owned())
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            AppError::Database(e) => match status {
                StatusCode::CONFLICT => json!({ "error": "Resource already exists (duplicate entry)" }),
                StatusCode::BAD_REQUEST => json!({ "error": "Referenced record does not exist" }),
                _ => {
                    error!("Database error: {:?}", e);
                    json!({ "error": "Internal server error" })
                }
            },
            AppError::NotFound(msg) => json!({ "error": msg }),
            AppError::Unauthorized => json!({ "error": "Unauthorized" }),
            AppError::Forbidden(msg) => json!({ "error": msg }),
            AppError::Conflict(msg) => json!({ "error": msg }),
            AppError::Validation(errors) => json!({
                "error": "Validation failed",
                "fields": errors,
            }),
            AppError::Mail(msg) => {
                error!("Mail error: {}", msg);
                json!({ "error": "Mail could not be delivered" })
            }
            AppError::Internal(msg) => {
                error!("Internal error: {}", msg);
                json!({ "error": "Internal server error" })
            }
        };

        (status, Json(body)).into_response()
    }
}
