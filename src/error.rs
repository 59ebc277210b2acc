use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// Bad input shape, rejected before any generation or persistence.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// State-machine violation (already used, cannot revoke, ...).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A foreign reference (sales point, account) does not resolve.
    #[error("Invalid reference: {0}")]
    Referential(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Persistence failures are terminal for the call but may be retried by
    /// the caller. Everything else will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Database(_) | AppError::Pool(_))
    }
}

/// Common user-facing messages.
pub mod msg {
    pub const KEY_NOT_FOUND: &str = "Activation key not found";
    pub const KEY_ALREADY_USED: &str = "Activation key already used";
    pub const KEY_REVOKED: &str = "Activation key has been revoked";
    pub const CANNOT_REVOKE_USED: &str = "Cannot revoke an activation key that has already been used";
    pub const KEY_ALREADY_REVOKED: &str = "Activation key already revoked";
    pub const INVALID_KEY_FORMAT: &str = "Invalid activation key format";
    pub const SALES_POINT_NOT_FOUND: &str = "Sales point not found";
    pub const ACCOUNT_NOT_FOUND: &str = "Account not found";
    pub const PAYMENT_NOT_FOUND: &str = "Online payment not found";
    pub const PAYMENT_NOT_PENDING: &str = "Online payment is no longer pending";
    pub const SALES_POINT_IN_USE: &str = "Sales point still has activation keys";
    pub const SALES_POINT_INACTIVE: &str = "Sales point is not active";
    pub const SALES_POINT_CODE_INVALID: &str = "Sales point code must be non-empty and alphanumeric";
    pub const COMMISSION_OUT_OF_RANGE: &str = "Commission rate must be between 0 and 100";
    pub const NAME_EMPTY: &str = "Name cannot be empty";
    pub const EMAIL_EMPTY: &str = "Email cannot be empty";
    pub const QUANTITY_INVALID: &str = "Quantity must be greater than 0";
    pub const DURATION_INVALID: &str = "Duration must be greater than 0 days";
    pub const DURATION_TOO_LONG: &str = "Duration cannot exceed 3650 days";
    pub const PRICE_OUT_OF_RANGE: &str = "Price must be between 0 and 1000000000";
    pub const EXPIRY_OUT_OF_RANGE: &str = "Subscription expiry is out of range";
}

/// Convert `Option<T>` lookups into `NotFound` errors.
pub trait OptionExt<T> {
    fn or_not_found(self, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn or_not_found(self, message: &str) -> Result<T> {
        self.ok_or_else(|| AppError::NotFound(message.into()))
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "Bad request", Some(msg.clone()))
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not found", Some(msg.clone())),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "Conflict", Some(msg.clone())),
            AppError::Referential(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Invalid reference",
                Some(msg.clone()),
            ),
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Json(e) => {
                tracing::error!("JSON error: {}", e);
                (StatusCode::BAD_REQUEST, "Invalid JSON", Some(e.to_string()))
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
