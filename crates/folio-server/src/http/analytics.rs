// SPDX-License-Identifier: Apache-2.0

//! Beacon endpoints under `/analytics`. Success is always `{success:true}`.

use crate::http::extract::ValidatedJson;
use crate::http::request_tracing::{normalized_header_value, RequestTrace};
use crate::http::response_contract::{internal_failure, ApiFailure};
use crate::services::{experiments, ingestion};
use crate::AppState;
use axum::extract::State;
use axum::http::header::{REFERER, USER_AGENT};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use folio_api::dto::{PAGE_MAX_LEN, TEXT_MAX_LEN};
use folio_api::{
    AbTestRequest, AckResponse, ApiError, BeaconContext, ConversionRequest, EngagementRequest,
    PageViewRequest, PerformanceRequest, SessionRequest,
};
use folio_store::AssignOutcome;

type BeaconResult = Result<Json<AckResponse>, ApiFailure>;

fn rejected(err: ApiError, trace: &RequestTrace) -> ApiFailure {
    ApiFailure(err.with_request_id(&trace.request_id))
}

fn user_agent(headers: &HeaderMap) -> Option<String> {
    normalized_header_value(headers, USER_AGENT.as_str(), TEXT_MAX_LEN)
}

fn beacon_context(state: &AppState, headers: &HeaderMap) -> BeaconContext {
    let ua = user_agent(headers);
    BeaconContext {
        now: Utc::now(),
        device: state.classifier.classify(ua.as_deref().unwrap_or_default()).device,
    }
}

pub(crate) async fn assign_handler(
    State(state): State<AppState>,
    trace: RequestTrace,
    ValidatedJson(body): ValidatedJson<AbTestRequest>,
) -> BeaconResult {
    let cmd = body.validate().map_err(|e| rejected(e, &trace))?;
    match experiments::assign(&state, cmd)
        .await
        .map_err(|e| internal_failure(&e, &trace.request_id, "ab_test.assign"))?
    {
        AssignOutcome::Assigned(_) => Ok(Json(AckResponse::ok())),
        AssignOutcome::Unavailable => Err(rejected(ApiError::experiment_not_found(), &trace)),
    }
}

pub(crate) async fn convert_handler(
    State(state): State<AppState>,
    trace: RequestTrace,
    ValidatedJson(body): ValidatedJson<AbTestRequest>,
) -> BeaconResult {
    let cmd = body.validate().map_err(|e| rejected(e, &trace))?;
    match experiments::convert(&state, cmd)
        .await
        .map_err(|e| internal_failure(&e, &trace.request_id, "ab_test.convert"))?
    {
        experiments::ConversionResult::Recorded { .. } => Ok(Json(AckResponse::ok())),
        experiments::ConversionResult::Unavailable => {
            Err(rejected(ApiError::experiment_not_found(), &trace))
        }
    }
}

pub(crate) async fn session_handler(
    State(state): State<AppState>,
    trace: RequestTrace,
    headers: HeaderMap,
    ValidatedJson(body): ValidatedJson<SessionRequest>,
) -> BeaconResult {
    let mut cmd = body.validate().map_err(|e| rejected(e, &trace))?;
    if cmd.referrer.is_none() {
        cmd.referrer = normalized_header_value(&headers, REFERER.as_str(), PAGE_MAX_LEN);
    }
    ingestion::apply_session(&state, cmd, user_agent(&headers), Utc::now())
        .await
        .map_err(|e| internal_failure(&e, &trace.request_id, "session"))?;
    Ok(Json(AckResponse::ok()))
}

pub(crate) async fn pageview_handler(
    State(state): State<AppState>,
    trace: RequestTrace,
    headers: HeaderMap,
    ValidatedJson(body): ValidatedJson<PageViewRequest>,
) -> BeaconResult {
    let view = body
        .validate(beacon_context(&state, &headers))
        .map_err(|e| rejected(e, &trace))?;
    ingestion::record_page_view(&state, view)
        .await
        .map_err(|e| internal_failure(&e, &trace.request_id, "pageview"))?;
    Ok(Json(AckResponse::ok()))
}

pub(crate) async fn performance_handler(
    State(state): State<AppState>,
    trace: RequestTrace,
    headers: HeaderMap,
    ValidatedJson(body): ValidatedJson<PerformanceRequest>,
) -> BeaconResult {
    let sample = body
        .validate(beacon_context(&state, &headers))
        .map_err(|e| rejected(e, &trace))?;
    ingestion::record_performance(&state, sample)
        .await
        .map_err(|e| internal_failure(&e, &trace.request_id, "performance"))?;
    Ok(Json(AckResponse::ok()))
}

pub(crate) async fn engagement_handler(
    State(state): State<AppState>,
    trace: RequestTrace,
    headers: HeaderMap,
    ValidatedJson(body): ValidatedJson<EngagementRequest>,
) -> BeaconResult {
    let event = body
        .validate(beacon_context(&state, &headers))
        .map_err(|e| rejected(e, &trace))?;
    ingestion::record_engagement(&state, event)
        .await
        .map_err(|e| internal_failure(&e, &trace.request_id, "engagement"))?;
    Ok(Json(AckResponse::ok()))
}

pub(crate) async fn conversion_handler(
    State(state): State<AppState>,
    trace: RequestTrace,
    headers: HeaderMap,
    ValidatedJson(body): ValidatedJson<ConversionRequest>,
) -> BeaconResult {
    let event = body
        .validate(beacon_context(&state, &headers))
        .map_err(|e| rejected(e, &trace))?;
    ingestion::record_conversion(&state, event)
        .await
        .map_err(|e| internal_failure(&e, &trace.request_id, "conversion"))?;
    Ok(Json(AckResponse::ok()))
}
