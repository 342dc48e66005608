// SPDX-License-Identifier: Apache-2.0

use crate::http::request_tracing::{client_ip, RequestTrace};
use crate::http::response_contract::api_error_response;
use crate::AppState;
use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use folio_api::ApiError;
use tracing::warn;

/// Per-client token bucket in front of the beacon routes.
pub(crate) async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let trace = request.extensions().get::<RequestTrace>().cloned();
    let client = trace
        .as_ref()
        .map_or_else(|| client_ip(request.headers(), request.extensions()), |t| {
            t.client_ip.clone()
        });
    let cfg = &state.api.rate_limit_per_ip;
    if state.ip_limiter.allow(&client, cfg).await {
        return next.run(request).await;
    }
    warn!(client_ip = %client, path = %request.uri().path(), "rate limited");
    let mut err = ApiError::rate_limited(cfg.retry_after_secs());
    if let Some(trace) = trace {
        err = err.with_request_id(trace.request_id);
    }
    api_error_response(err)
}
