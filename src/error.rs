// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::database::DataError;

/// Fixed code for every unexpected backend failure
pub const INTERNAL_ERROR_CODE: &str = "internal_server_error";
/// Description sent with 500s; the real cause only goes to the log
pub const INTERNAL_ERROR_DESC: &str = "something went wrong";

/// Wire shape of every 4xx/5xx body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMsg {
    pub error: String,
    pub error_description: String,
}

/// HTTP API error with a status, a machine-readable code and a client-facing description
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest { code: String, desc: String },

    // 401 Unauthorized
    Unauthorized { code: String, desc: String },

    // 403 Forbidden
    Forbidden { code: String, desc: String },

    // 404 Not Found
    NotFound { code: String, desc: String },

    // 415 Unsupported Media Type
    UnsupportedMediaType { code: String, desc: String },

    // 422 Unprocessable Entity
    UnprocessableEntity { code: String, desc: String },

    // 500 Internal Server Error
    InternalServerError,

    // 503 Service Unavailable
    ServiceUnavailable { code: String, desc: String },
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::UnprocessableEntity { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &str {
        match self {
            ApiError::BadRequest { code, .. }
            | ApiError::Unauthorized { code, .. }
            | ApiError::Forbidden { code, .. }
            | ApiError::NotFound { code, .. }
            | ApiError::UnsupportedMediaType { code, .. }
            | ApiError::UnprocessableEntity { code, .. }
            | ApiError::ServiceUnavailable { code, .. } => code,
            ApiError::InternalServerError => INTERNAL_ERROR_CODE,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest { desc, .. }
            | ApiError::Unauthorized { desc, .. }
            | ApiError::Forbidden { desc, .. }
            | ApiError::NotFound { desc, .. }
            | ApiError::UnsupportedMediaType { desc, .. }
            | ApiError::UnprocessableEntity { desc, .. }
            | ApiError::ServiceUnavailable { desc, .. } => desc,
            ApiError::InternalServerError => INTERNAL_ERROR_DESC,
        }
    }

    pub fn to_error_msg(&self) -> ErrorMsg {
        ErrorMsg {
            error: self.error_code().to_string(),
            error_description: self.message().to_string(),
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        json!({
            "error": self.error_code(),
            "error_description": self.message(),
        })
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(code: impl Into<String>, desc: impl Into<String>) -> Self {
        ApiError::BadRequest { code: code.into(), desc: desc.into() }
    }

    /// 400 for a missing request parameter, e.g. `slug_required` / `slug required`
    pub fn missing_param(field: &str) -> Self {
        ApiError::bad_request(format!("{}_required", field), format!("{} required", field))
    }

    pub fn unauthorized(code: impl Into<String>, desc: impl Into<String>) -> Self {
        ApiError::Unauthorized { code: code.into(), desc: desc.into() }
    }

    pub fn forbidden(code: impl Into<String>, desc: impl Into<String>) -> Self {
        ApiError::Forbidden { code: code.into(), desc: desc.into() }
    }

    pub fn not_found(code: impl Into<String>, desc: impl Into<String>) -> Self {
        ApiError::NotFound { code: code.into(), desc: desc.into() }
    }

    pub fn unsupported_media_type(code: impl Into<String>, desc: impl Into<String>) -> Self {
        ApiError::UnsupportedMediaType { code: code.into(), desc: desc.into() }
    }

    pub fn unprocessable_entity(code: impl Into<String>, desc: impl Into<String>) -> Self {
        ApiError::UnprocessableEntity { code: code.into(), desc: desc.into() }
    }

    pub fn internal_server_error() -> Self {
        ApiError::InternalServerError
    }

    pub fn service_unavailable(code: impl Into<String>, desc: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable { code: code.into(), desc: desc.into() }
    }
}

// Client-caused data errors keep their tag; handlers that want 404 build it themselves
impl From<DataError> for ApiError {
    fn from(err: DataError) -> Self {
        ApiError::BadRequest { code: err.code, desc: err.desc }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status_code(), Json(self.to_error_msg())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_param_uses_field_code() {
        let err = ApiError::missing_param("slug");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_code(), "slug_required");
        assert_eq!(err.message(), "slug required");
    }

    #[test]
    fn internal_error_never_carries_detail() {
        let err = ApiError::internal_server_error();
        assert_eq!(
            err.to_json(),
            json!({"error": "internal_server_error", "error_description": "something went wrong"})
        );
    }

    #[test]
    fn data_error_keeps_its_tag() {
        let err: ApiError = DataError::new("unique_violation", "hub exists").into();
        assert_eq!(err, ApiError::bad_request("unique_violation", "hub exists"));
    }
}
