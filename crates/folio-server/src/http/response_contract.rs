// SPDX-License-Identifier: Apache-2.0

use crate::services::ServiceError;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use folio_api::error_mapping::status_for;
use folio_api::{ApiError, ApiErrorCode};

/// Handler error carrying the wire envelope; the status follows the code.
#[derive(Debug)]
pub(crate) struct ApiFailure(pub ApiError);

impl From<ApiError> for ApiFailure {
    fn from(err: ApiError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        api_error_response(self.0)
    }
}

#[must_use]
pub(crate) fn api_error_status(code: ApiErrorCode) -> StatusCode {
    StatusCode::from_u16(status_for(code)).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

#[must_use]
pub(crate) fn api_error_response(err: ApiError) -> Response {
    let status = api_error_status(err.code);
    let retry_after = err
        .details
        .get("retry_after_secs")
        .and_then(serde_json::Value::as_u64);
    let mut resp = (status, Json(err)).into_response();
    if let Some(secs) = retry_after {
        if let Ok(v) = HeaderValue::from_str(&secs.to_string()) {
            resp.headers_mut().insert("retry-after", v);
        }
    }
    resp
}

/// Logs the full failure and hides it behind a generic internal error.
#[must_use]
pub(crate) fn internal_failure(err: &ServiceError, request_id: &str, operation: &str) -> ApiFailure {
    tracing::error!(
        request_id = %request_id,
        operation = operation,
        transient = err.is_transient(),
        error = %err,
        "request failed"
    );
    ApiFailure(ApiError::internal().with_request_id(request_id))
}
