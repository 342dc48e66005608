// SPDX-License-Identifier: Apache-2.0

use crate::config::Role;
use crate::http::request_tracing::{normalized_header_value, RequestTrace};
use crate::http::response_contract::api_error_response;
use crate::AppState;
use axum::body::Body;
use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::Response;
use folio_api::{ApiError, UNKNOWN_REQUEST_ID};
use tracing::warn;

const API_KEY_MAX_LEN: usize = 256;

/// Key from `x-api-key`, or from `authorization: Bearer <key>`.
fn presented_key(headers: &HeaderMap) -> Option<String> {
    normalized_header_value(headers, "x-api-key", API_KEY_MAX_LEN).or_else(|| {
        let raw = normalized_header_value(headers, AUTHORIZATION.as_str(), API_KEY_MAX_LEN)?;
        let (scheme, token) = raw.split_once(' ')?;
        let token = token.trim();
        (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then(|| token.to_string())
    })
}

/// Admits only callers whose key maps to the admin role.
pub(crate) async fn admin_auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let request_id = request
        .extensions()
        .get::<RequestTrace>()
        .map_or_else(|| UNKNOWN_REQUEST_ID.to_string(), |t| t.request_id.clone());
    let Some(key) = presented_key(request.headers()) else {
        return api_error_response(ApiError::unauthorized().with_request_id(request_id));
    };
    match state.api.role_for_key(&key) {
        Some(Role::Admin) => next.run(request).await,
        Some(role) => {
            warn!(request_id = %request_id, role = role.as_str(), "admin route denied");
            api_error_response(
                ApiError::forbidden(Role::Admin.as_str()).with_request_id(request_id),
            )
        }
        None => {
            warn!(request_id = %request_id, "unknown api key");
            api_error_response(ApiError::unauthorized().with_request_id(request_id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn reads_api_key_header_before_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-bearer"));
        assert_eq!(presented_key(&headers).as_deref(), Some("from-bearer"));
        headers.insert("x-api-key", HeaderValue::from_static("from-header"));
        assert_eq!(presented_key(&headers).as_deref(), Some("from-header"));
    }

    #[test]
    fn ignores_other_authorization_schemes() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(presented_key(&headers), None);
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(presented_key(&headers), None);
    }
}
