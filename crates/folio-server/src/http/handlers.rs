// SPDX-License-Identifier: Apache-2.0

use crate::http::request_tracing::RequestTrace;
use crate::http::response_contract::api_error_response;
use crate::services::with_store;
use crate::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use folio_api::{openapi_v1_spec, ApiError, HealthResponse};
use folio_store::SqliteStore;
use std::sync::atomic::Ordering;

pub(crate) async fn healthz_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

pub(crate) async fn readyz_handler(State(state): State<AppState>, trace: RequestTrace) -> Response {
    if !state.ready.load(Ordering::Relaxed) {
        return api_error_response(
            ApiError::not_ready("draining").with_request_id(&trace.request_id),
        );
    }
    match with_store(&state.store, SqliteStore::ping).await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ready".to_string(),
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(request_id = %trace.request_id, error = %e, "readiness ping failed");
            api_error_response(
                ApiError::not_ready("store unavailable").with_request_id(&trace.request_id),
            )
        }
    }
}

pub(crate) async fn openapi_handler() -> Json<serde_json::Value> {
    Json(openapi_v1_spec())
}

pub(crate) async fn not_found_handler(trace: RequestTrace) -> Response {
    api_error_response(ApiError::not_found("Route not found").with_request_id(&trace.request_id))
}
