// SPDX-License-Identifier: Apache-2.0

use crate::http::request_tracing::{client_ip, RequestTrace};
use crate::http::response_contract::ApiFailure;
use crate::AppState;
use axum::body::Bytes;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use axum::http::StatusCode;
use folio_api::{ApiError, UNKNOWN_REQUEST_ID};
use serde::de::DeserializeOwned;
use std::convert::Infallible;

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RequestTrace {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestTrace>()
            .cloned()
            .unwrap_or_else(|| RequestTrace {
                request_id: UNKNOWN_REQUEST_ID.to_string(),
                client_ip: client_ip(&parts.headers, &parts.extensions),
            }))
    }
}

/// JSON body whose decode failures become `ValidationFailed` on field `body`.
/// The content type is not checked: browsers send beacons as `text/plain`.
pub(crate) struct ValidatedJson<T>(pub T);

#[axum::async_trait]
impl<T> FromRequest<AppState> for ValidatedJson<T>
where
    T: DeserializeOwned + Send,
{
    type Rejection = ApiFailure;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let request_id = req
            .extensions()
            .get::<RequestTrace>()
            .map_or_else(|| UNKNOWN_REQUEST_ID.to_string(), |t| t.request_id.clone());
        let bytes = Bytes::from_request(req, state).await.map_err(|rejection| {
            let err = if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                ApiError::payload_too_large(state.api.max_body_bytes)
            } else {
                ApiError::malformed_body(rejection.body_text())
            };
            ApiFailure(err.with_request_id(&request_id))
        })?;
        serde_json::from_slice::<T>(&bytes)
            .map(Self)
            .map_err(|e| ApiFailure(ApiError::malformed_body(e.to_string()).with_request_id(&request_id)))
    }
}
