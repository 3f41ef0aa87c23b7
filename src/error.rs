/// Unified error types for Tradepost
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the service
#[derive(Error, Debug)]
pub enum ApiError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Authentication errors (missing/invalid credentials or token)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Authorization errors (valid principal, insufficient rights)
    #[error("Not authorized: {0}")]
    Authorization(String),

    /// Validation errors (missing or malformed input)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conflict errors (e.g., duplicate signup email)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Insufficient stock for one or more order items
    #[error("Insufficient stock")]
    InsufficientStock { details: serde_json::Value },

    /// Payment provider errors
    #[error("Payment provider error: {0}")]
    Payment(String),

    /// Email delivery errors
    #[error("Mail error: {0}")]
    Mail(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Convert ApiError to HTTP response
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            ApiError::Authentication(_) => (
                StatusCode::UNAUTHORIZED,
                "AuthenticationRequired",
                self.to_string(),
                None,
            ),
            ApiError::Authorization(_) => {
                (StatusCode::FORBIDDEN, "Forbidden", self.to_string(), None)
            }
            ApiError::Validation(_) => (
                StatusCode::BAD_REQUEST,
                "InvalidRequest",
                self.to_string(),
                None,
            ),
            ApiError::NotFound(_) => {
                (StatusCode::NOT_FOUND, "NotFound", self.to_string(), None)
            }
            // Duplicate signups report as 400, which clients expect
            ApiError::Conflict(_) => (
                StatusCode::BAD_REQUEST,
                "Conflict",
                self.to_string(),
                None,
            ),
            ApiError::InsufficientStock { details } => (
                StatusCode::BAD_REQUEST,
                "InsufficientStock",
                "Insufficient stock".to_string(),
                Some(details),
            ),
            ApiError::Payment(ref detail) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "PaymentProviderError",
                format!("Failed to create checkout session: {}", detail),
                None,
            ),
            ApiError::Database(_) | ApiError::Internal(_) | ApiError::Io(_) | ApiError::Mail(_) => {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "InternalServerError",
                    "Internal server error".to_string(), // Don't leak details
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

/// Result type alias for service operations
pub type ApiResult<T> = Result<T, ApiError>;
