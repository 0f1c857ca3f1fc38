//! API response envelope and error mapping
//!
//! - `ApiResponse<T>`: unified response wrapper
//! - `error_codes`: numeric codes carried in `ApiResponse::code`
//! - `IntoResponse` for [`CoreError`]

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::CoreError;

// ============================================================================
// Unified API Response Format
// ============================================================================

/// Unified API response wrapper
///
/// All API responses follow this structure:
/// - code: 0 = success, non-zero = error code
/// - msg: short message description
/// - data: actual data (success) or null (error)
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Response code: 0 for success, non-zero for errors
    #[schema(example = 0)]
    pub code: i32,
    /// Response message
    #[schema(example = "ok")]
    pub msg: String,
    /// Response data (only present when code == 0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Create success response
    pub fn success(data: T) -> Self {
        Self {
            code: 0,
            msg: "ok".to_string(),
            data: Some(data),
        }
    }

    /// Create error response
    pub fn error(code: i32, msg: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            code,
            msg: msg.into(),
            data: None,
        }
    }
}

/// Handler result: JSON envelope or a mapped [`CoreError`]
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, CoreError>;

pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data)))
}

// ============================================================================
// Error Codes
// ============================================================================

/// Standard API error codes
pub mod error_codes {
    // Success
    pub const SUCCESS: i32 = 0;

    // Client errors (1xxx)
    pub const INVALID_PARAMETER: i32 = 1001;
    pub const ALREADY_ENROLLED: i32 = 1002;
    pub const PAYMENT_VERIFICATION_FAILED: i32 = 1003;

    // Auth errors (2xxx)
    pub const AUTH_FAILED: i32 = 2002;
    pub const ACCESS_DENIED: i32 = 2003;

    // Resource errors (4xxx)
    pub const NOT_FOUND: i32 = 4001;
    pub const CONFLICT: i32 = 4091;

    // Server errors (5xxx)
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const SERVICE_UNAVAILABLE: i32 = 5001;
}

fn numeric_code(e: &CoreError) -> i32 {
    match e {
        CoreError::Validation(_) => error_codes::INVALID_PARAMETER,
        CoreError::AlreadyEnrolled => error_codes::ALREADY_ENROLLED,
        CoreError::PaymentVerification(_) => error_codes::PAYMENT_VERIFICATION_FAILED,
        CoreError::Unauthorized(_) => error_codes::AUTH_FAILED,
        CoreError::AccessDenied(_) => error_codes::ACCESS_DENIED,
        CoreError::NotFound(_) => error_codes::NOT_FOUND,
        CoreError::Conflict(_) => error_codes::CONFLICT,
        CoreError::ProviderUnavailable(_) => error_codes::SERVICE_UNAVAILABLE,
        CoreError::Storage(_) => error_codes::INTERNAL_ERROR,
    }
}

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        // Storage details stay in the log
        let msg = match &self {
            CoreError::Storage(detail) => {
                tracing::error!(error = %detail, "Storage failure");
                "Internal error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(ApiResponse::<()>::error(numeric_code(&self), msg))).into_response()
    }
}
