use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Error body returned to HTTP callers. The `error` string and `status` code
/// are a stable contract; the storefront surfaces `error` directly.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Always `false`.
    pub success: bool,
    /// Human-readable error description
    #[schema(example = "Checkout has already been completed")]
    pub error: String,
    /// HTTP status code, duplicated in the body for clients that only look
    /// at the payload
    #[schema(example = 410)]
    pub status: u16,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Caller sent a payload the service cannot act on.
    #[error("{0}")]
    InvalidInput(String),

    /// Request DTO failed validator checks.
    #[error("{0}")]
    ValidationError(String),

    /// The resource exists but is not in a state that permits the operation.
    #[error("{0}")]
    InvalidOperation(String),

    #[error("{0}")]
    NotFound(String),

    /// The resource existed and finished its lifecycle (completed checkout).
    #[error("{0}")]
    Gone(String),

    /// The provider's view of the payment disagrees with ours: not captured,
    /// or captured for a different amount.
    #[error("{0}")]
    PaymentFailed(String),

    /// The provider read API could not be consulted. Provider error detail is
    /// logged, never surfaced.
    #[error("Failed to verify payment")]
    PaymentVerificationFailed,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::error::DbErr),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_)
            | Self::ValidationError(_)
            | Self::InvalidOperation(_)
            | Self::PaymentFailed(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Gone(_) => StatusCode::GONE,
            Self::PaymentVerificationFailed | Self::DatabaseError(_) | Self::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message suitable for HTTP responses. Infrastructure errors return a
    /// generic message instead of leaking implementation detail.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::InternalError(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            success: false,
            error: self.response_message(),
            status: status.as_u16(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(body)).into_response()
    }
}
