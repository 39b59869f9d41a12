use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use thiserror::Error;

use crate::utils::response::service_name;

#[derive(Debug, Error)]
pub enum ForumError {
    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid Argument: {0}")]
    InvalidArgument(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid State: {0}")]
    InvalidState(String),

    #[error("Unavailable: {message}")]
    Unavailable { message: String, safe_to_retry: bool },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

impl ForumError {
    /// Transient storage failure that the caller may retry.
    pub fn unavailable(message: impl Into<String>) -> Self {
        ForumError::Unavailable {
            message: message.into(),
            safe_to_retry: true,
        }
    }

    /// Marks a transient failure of a non-idempotent operation (content
    /// creation) so that callers do not blindly resubmit it.
    pub fn not_retryable(self) -> Self {
        match self {
            ForumError::Unavailable { message, .. } => ForumError::Unavailable {
                message,
                safe_to_retry: false,
            },
            other => other,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ForumError::Unavailable {
                safe_to_retry: true,
                ..
            }
        )
    }

    /// Stable error kind exposed to clients.
    pub fn kind(&self) -> &'static str {
        match self {
            ForumError::NotFound(..) => "NOT_FOUND",
            ForumError::Forbidden(..) => "FORBIDDEN",
            ForumError::InvalidArgument(..) => "INVALID_ARGUMENT",
            ForumError::Conflict(..) => "CONFLICT",
            ForumError::InvalidState(..) => "INVALID_STATE",
            ForumError::Unavailable { .. } => "UNAVAILABLE",
            ForumError::Unauthorized(..) => "UNAUTHORIZED",
        }
    }
}

impl From<mongodb::error::Error> for ForumError {
    fn from(err: mongodb::error::Error) -> Self {
        log::error!("MongoDB operation failed: {}", err);
        ForumError::unavailable("Storage is temporarily unavailable")
    }
}

impl From<mongodb::bson::ser::Error> for ForumError {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        log::error!("Failed to encode document: {}", err);
        ForumError::unavailable("Storage is temporarily unavailable")
    }
}

impl ResponseError for ForumError {
    fn status_code(&self) -> StatusCode {
        match *self {
            ForumError::NotFound(..) => StatusCode::NOT_FOUND,
            ForumError::Forbidden(..) => StatusCode::FORBIDDEN,
            ForumError::InvalidArgument(..) => StatusCode::BAD_REQUEST,
            ForumError::Conflict(..) => StatusCode::CONFLICT,
            ForumError::InvalidState(..) => StatusCode::UNPROCESSABLE_ENTITY,
            ForumError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ForumError::Unauthorized(..) => StatusCode::UNAUTHORIZED,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error_message = json!({
            "success": false,
            "message": self.to_string(),
            "httpStatusCode": self.status_code().as_u16(),
            "error": self.kind(),
            "retryable": self.is_retryable(),
            "service": service_name(),
        });

        HttpResponse::build(self.status_code()).json(error_message)
    }
}
