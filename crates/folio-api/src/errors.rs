// SPDX-License-Identifier: Apache-2.0

use folio_model::ParseError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const UNKNOWN_REQUEST_ID: &str = "req-unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ApiErrorCode {
    ValidationFailed,
    NotFound,
    Unauthorized,
    Forbidden,
    Conflict,
    RateLimited,
    PayloadTooLarge,
    NotReady,
    Internal,
}

impl ApiErrorCode {
    pub const ALL: [ApiErrorCode; 9] = [
        Self::ValidationFailed,
        Self::NotFound,
        Self::Unauthorized,
        Self::Forbidden,
        Self::Conflict,
        Self::RateLimited,
        Self::PayloadTooLarge,
        Self::NotReady,
        Self::Internal,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ValidationFailed => "ValidationFailed",
            Self::NotFound => "NotFound",
            Self::Unauthorized => "Unauthorized",
            Self::Forbidden => "Forbidden",
            Self::Conflict => "Conflict",
            Self::RateLimited => "RateLimited",
            Self::PayloadTooLarge => "PayloadTooLarge",
            Self::NotReady => "NotReady",
            Self::Internal => "Internal",
        }
    }
}

/// One rejected request field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub reason: String,
}

impl FieldError {
    #[must_use]
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<ParseError> for FieldError {
    fn from(err: ParseError) -> Self {
        Self::new(err.field(), err.to_string())
    }
}

/// Error envelope. On the wire it keeps the beacon shape `{success:false, error}`
/// and adds the machine-readable `code`, `details` and `requestId`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "ApiErrorWire", from = "ApiErrorWire")]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
    pub details: Value,
    pub request_id: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ApiErrorWire {
    success: bool,
    error: String,
    code: ApiErrorCode,
    details: Value,
    request_id: String,
}

impl From<ApiError> for ApiErrorWire {
    fn from(e: ApiError) -> Self {
        Self {
            success: false,
            error: e.message,
            code: e.code,
            details: e.details,
            request_id: e.request_id,
        }
    }
}

impl From<ApiErrorWire> for ApiError {
    fn from(w: ApiErrorWire) -> Self {
        Self {
            code: w.code,
            message: w.error,
            details: w.details,
            request_id: w.request_id,
        }
    }
}

impl ApiError {
    #[must_use]
    pub fn new(
        code: ApiErrorCode,
        message: impl Into<String>,
        details: Value,
        request_id: impl Into<String>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            request_id: request_id.into(),
        }
    }

    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    #[must_use]
    pub fn validation_failed(field_errors: Vec<FieldError>) -> Self {
        Self::new(
            ApiErrorCode::ValidationFailed,
            "validation failed",
            json!({ "field_errors": field_errors }),
            UNKNOWN_REQUEST_ID,
        )
    }

    #[must_use]
    pub fn invalid_field(field: &str, reason: impl Into<String>) -> Self {
        Self::validation_failed(vec![FieldError::new(field, reason)])
    }

    #[must_use]
    pub fn malformed_body(reason: impl Into<String>) -> Self {
        Self::invalid_field("body", reason)
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(
            ApiErrorCode::NotFound,
            message,
            json!({}),
            UNKNOWN_REQUEST_ID,
        )
    }

    #[must_use]
    pub fn experiment_not_found() -> Self {
        Self::not_found("Experiment not found or inactive")
    }

    #[must_use]
    pub fn unauthorized() -> Self {
        Self::new(
            ApiErrorCode::Unauthorized,
            "Unauthorized",
            json!({}),
            UNKNOWN_REQUEST_ID,
        )
    }

    #[must_use]
    pub fn forbidden(required_role: &str) -> Self {
        Self::new(
            ApiErrorCode::Forbidden,
            "Forbidden",
            json!({ "required_role": required_role }),
            UNKNOWN_REQUEST_ID,
        )
    }

    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(
            ApiErrorCode::Conflict,
            message,
            json!({}),
            UNKNOWN_REQUEST_ID,
        )
    }

    #[must_use]
    pub fn rate_limited(retry_after_secs: u64) -> Self {
        Self::new(
            ApiErrorCode::RateLimited,
            "Too many requests",
            json!({ "retry_after_secs": retry_after_secs }),
            UNKNOWN_REQUEST_ID,
        )
    }

    #[must_use]
    pub fn payload_too_large(limit_bytes: usize) -> Self {
        Self::new(
            ApiErrorCode::PayloadTooLarge,
            "Request body too large",
            json!({ "limit_bytes": limit_bytes }),
            UNKNOWN_REQUEST_ID,
        )
    }

    #[must_use]
    pub fn not_ready(reason: impl Into<String>) -> Self {
        Self::new(
            ApiErrorCode::NotReady,
            "Service not ready",
            json!({ "reason": reason.into() }),
            UNKNOWN_REQUEST_ID,
        )
    }

    /// Generic server error. Details are never echoed to the client.
    #[must_use]
    pub fn internal() -> Self {
        Self::new(
            ApiErrorCode::Internal,
            "Internal server error",
            json!({}),
            UNKNOWN_REQUEST_ID,
        )
    }

    #[must_use]
    pub fn field_errors(&self) -> Vec<FieldError> {
        self.details
            .get("field_errors")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for ApiError {}
