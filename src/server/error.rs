//! Error types for the HTTP service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::utils::error::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    /// Rejected upload or query parameter
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Upload exceeds the size limit")]
    PayloadTooLarge,

    #[error("Model not loaded")]
    ModelUnavailable,

    #[error("Database not connected")]
    DatabaseUnavailable,

    /// Decode, resize or inference failure
    #[error("Processing error: {0}")]
    Processing(String),

    /// Database read failure
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<Error> for ServerError {
    fn from(err: Error) -> Self {
        match err {
            Error::Validation(msg) => ServerError::Validation(msg),
            Error::Persistence(msg) => ServerError::Persistence(msg),
            other => ServerError::Processing(other.to_string()),
        }
    }
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Validation(_) => StatusCode::BAD_REQUEST,
            ServerError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::ModelUnavailable | ServerError::DatabaseUnavailable => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ServerError::Processing(_) | ServerError::Persistence(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let message = match &self {
            ServerError::Validation(msg) => msg.clone(),
            ServerError::Processing(detail) => {
                tracing::error!(detail = %detail, "Image processing failed");
                "Error processing image".to_string()
            }
            ServerError::Persistence(detail) => {
                tracing::error!(detail = %detail, "Database query failed");
                "Error reading prediction history".to_string()
            }
            ServerError::ModelUnavailable => {
                "Model not loaded. Check the server logs and the model path.".to_string()
            }
            ServerError::DatabaseUnavailable => "Database not connected".to_string(),
            other => other.to_string(),
        };

        (self.status(), Json(json!({ "error": message }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_error_mapping() {
        let err: ServerError = Error::Decode("bad png".to_string()).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let err: ServerError = Error::Validation("no file".to_string()).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err: ServerError = Error::Persistence("timeout".to_string()).into();
        assert!(matches!(err, ServerError::Persistence(_)));
    }

    #[test]
    fn test_unavailable_is_503() {
        assert_eq!(ServerError::ModelUnavailable.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ServerError::DatabaseUnavailable.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_processing_detail_hidden() {
        let response = ServerError::Processing("stack trace".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
