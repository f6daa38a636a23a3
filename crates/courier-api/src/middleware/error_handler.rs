//! API error responses

use actix_web::{HttpResponse, ResponseError};
use courier_core::sanitize::sanitize;
use courier_core::CoreError;
use serde::{Deserialize, Serialize};
use tracing::error;

/// JSON error body returned to clients
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub code: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ErrorResponse {
    pub fn new(error: String, message: String, code: String) -> Self {
        Self {
            error,
            message: sanitize(&message),
            code,
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Application-specific errors that convert to HTTP responses
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        use actix_web::http::StatusCode;

        match self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            ApiError::InvalidRequest(msg) => ErrorResponse::new(
                "Bad Request".to_string(),
                msg.clone(),
                "INVALID_REQUEST".to_string(),
            ),
            ApiError::Unauthorized => ErrorResponse::new(
                "Unauthorized".to_string(),
                "Site key verification failed".to_string(),
                "UNAUTHORIZED".to_string(),
            ),
            ApiError::NotFound(msg) => ErrorResponse::new(
                "Not Found".to_string(),
                msg.clone(),
                "NOT_FOUND".to_string(),
            ),
            ApiError::Internal(msg) => {
                error!("Internal error surfaced to client: {msg}");
                ErrorResponse::new(
                    "Internal Server Error".to_string(),
                    "An unexpected error occurred".to_string(),
                    "INTERNAL_ERROR".to_string(),
                )
            }
        };

        HttpResponse::build(self.status_code()).json(body)
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(msg) => ApiError::InvalidRequest(msg),
            CoreError::NotFound { entity_type, id } => {
                ApiError::NotFound(format!("{entity_type} {id}"))
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::InvalidRequest("x".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::Internal("x".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_core_error_mapping() {
        let api: ApiError = CoreError::validation("recipient missing").into();
        assert!(matches!(api, ApiError::InvalidRequest(_)));

        let api: ApiError = CoreError::bus("redis down").into();
        assert!(matches!(api, ApiError::Internal(_)));
    }

    #[test]
    fn test_internal_errors_are_not_echoed() {
        let response = ApiError::Internal("secret detail".to_string()).error_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_error_body_is_sanitized() {
        let body = ErrorResponse::new(
            "Bad Request".to_string(),
            format!("key Bearer {}", "t".repeat(40)),
            "INVALID_REQUEST".to_string(),
        );
        assert!(!body.message.contains(&"t".repeat(40)));
    }
}
