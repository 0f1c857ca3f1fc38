//! Core error taxonomy
//!
//! Every operation of the engine returns [`CoreError`]. The HTTP layer maps
//! it to a status code and a stable error code string.

use thiserror::Error;

/// Engine error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    // === Caller-correctable ===
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Already enrolled in this program")]
    AlreadyEnrolled,

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Authentication required: {0}")]
    Unauthorized(String),

    // === Payment ===
    #[error("Payment verification failed: {0}")]
    PaymentVerification(String),

    /// Retryable: no state was committed
    #[error("Payment provider unavailable: {0}")]
    ProviderUnavailable(String),

    // === System ===
    #[error("Storage error: {0}")]
    Storage(String),
}

impl CoreError {
    pub fn not_found(what: impl Into<String>) -> Self {
        CoreError::NotFound(what.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        CoreError::Validation(msg.into())
    }

    pub fn access_denied(msg: impl Into<String>) -> Self {
        CoreError::AccessDenied(msg.into())
    }

    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Validation(_) => "VALIDATION_ERROR",
            CoreError::NotFound(_) => "NOT_FOUND",
            CoreError::Conflict(_) => "CONFLICT",
            CoreError::AlreadyEnrolled => "ALREADY_ENROLLED",
            CoreError::AccessDenied(_) => "ACCESS_DENIED",
            CoreError::Unauthorized(_) => "UNAUTHORIZED",
            CoreError::PaymentVerification(_) => "PAYMENT_VERIFICATION_FAILED",
            CoreError::ProviderUnavailable(_) => "PROVIDER_UNAVAILABLE",
            CoreError::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            CoreError::Validation(_)
            | CoreError::AlreadyEnrolled
            | CoreError::PaymentVerification(_) => 400,
            CoreError::Unauthorized(_) => 401,
            CoreError::AccessDenied(_) => 403,
            CoreError::NotFound(_) => 404,
            CoreError::Conflict(_) => 409,
            CoreError::Storage(_) => 500,
            CoreError::ProviderUnavailable(_) => 503,
        }
    }

    /// Whether the caller may safely repeat the same request
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoreError::ProviderUnavailable(_) | CoreError::Storage(_)
        )
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(e: sqlx::Error) -> Self {
        CoreError::Storage(e.to_string())
    }
}

impl From<validator::ValidationErrors> for CoreError {
    fn from(e: validator::ValidationErrors) -> Self {
        CoreError::Validation(e.to_string())
    }
}
