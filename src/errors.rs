use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Standard error body returned by every failing endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Short error label (e.g. "Invalid Signature", "Bad Request")
    pub error: String,
    /// Human-readable description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::error::DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Coupon checks failed. Non-fatal: the orchestrator degrades to zero
    /// discount instead of surfacing this to the client.
    #[error("Coupon not applicable: {0}")]
    CouponInapplicable(String),

    /// Payment provider unreachable or rejected the intent request.
    #[error("Payment provider error: {0}")]
    PaymentUpstream(String),

    /// Supplied payment signature did not match the recomputed HMAC.
    #[error("Invalid Signature")]
    InvalidSignature,

    /// Order write failed after payment verification succeeded. Money may be
    /// captured without an order record; surfaced distinctly so operators
    /// can reconcile out-of-band.
    #[error("Payment succeeded but order recording failed, contact support")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::Validation(err.to_string())
    }
}

impl ServiceError {
    /// Single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) | Self::InvalidOperation(_) | Self::CouponInapplicable(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::InvalidSignature => StatusCode::BAD_REQUEST,
            Self::PaymentUpstream(_) => StatusCode::BAD_GATEWAY,
            Self::Database(_) | Self::Persistence(_) | Self::Config(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message suitable for HTTP responses. Internal faults return generic
    /// text; provider key material must never appear here.
    pub fn response_message(&self) -> String {
        match self {
            Self::Database(_) => "Database error".to_string(),
            Self::Internal(_) | Self::Config(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }

    /// Short label used as the `error` field of the response body.
    fn response_label(&self) -> String {
        match self {
            Self::InvalidSignature => "Invalid Signature".to_string(),
            other => other
                .status_code()
                .canonical_reason()
                .unwrap_or("Error")
                .to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.response_label(),
            message: match &self {
                // The label already carries the whole message.
                Self::InvalidSignature => None,
                other => Some(other.response_message()),
            },
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(body)).into_response()
    }
}
