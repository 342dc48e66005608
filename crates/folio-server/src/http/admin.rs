// SPDX-License-Identifier: Apache-2.0

use crate::http::extract::ValidatedJson;
use crate::http::request_tracing::RequestTrace;
use crate::http::response_contract::{internal_failure, ApiFailure};
use crate::services::{experiments, reports, ServiceError};
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use folio_api::{
    AckResponse, ApiError, CreateExperimentRequest, ExperimentListResponse, ExperimentResponse,
    FieldError, ReportQuery, UpdateExperimentRequest,
};
use folio_core::ReportRange;
use folio_model::ExperimentId;
use folio_store::{DashboardReport, StoreError};

const EXPERIMENT_NOT_FOUND: &str = "Experiment not found";

fn experiment_id(raw: &str, trace: &RequestTrace) -> Result<ExperimentId, ApiFailure> {
    ExperimentId::parse(raw).map_err(|e| {
        ApiFailure(
            ApiError::validation_failed(vec![FieldError::from(e)])
                .with_request_id(&trace.request_id),
        )
    })
}

fn missing(trace: &RequestTrace) -> ApiFailure {
    ApiFailure(ApiError::not_found(EXPERIMENT_NOT_FOUND).with_request_id(&trace.request_id))
}

pub(crate) async fn list_experiments_handler(
    State(state): State<AppState>,
    trace: RequestTrace,
) -> Result<Json<ExperimentListResponse>, ApiFailure> {
    let experiments = experiments::list(&state)
        .await
        .map_err(|e| internal_failure(&e, &trace.request_id, "experiments.list"))?;
    Ok(Json(ExperimentListResponse { experiments }))
}

pub(crate) async fn create_experiment_handler(
    State(state): State<AppState>,
    trace: RequestTrace,
    ValidatedJson(body): ValidatedJson<CreateExperimentRequest>,
) -> Result<(StatusCode, Json<ExperimentResponse>), ApiFailure> {
    let new = body
        .validate()
        .map_err(|e| ApiFailure(e.with_request_id(&trace.request_id)))?;
    match experiments::create(&state, new).await {
        Ok(experiment) => Ok((StatusCode::CREATED, Json(ExperimentResponse { experiment }))),
        Err(ServiceError::Store(StoreError::DuplicateName { name })) => Err(ApiFailure(
            ApiError::conflict(format!("Experiment `{name}` already exists"))
                .with_request_id(&trace.request_id),
        )),
        Err(e) => Err(internal_failure(&e, &trace.request_id, "experiments.create")),
    }
}

pub(crate) async fn get_experiment_handler(
    State(state): State<AppState>,
    trace: RequestTrace,
    Path(raw_id): Path<String>,
) -> Result<Json<ExperimentResponse>, ApiFailure> {
    let id = experiment_id(&raw_id, &trace)?;
    experiments::get(&state, id)
        .await
        .map_err(|e| internal_failure(&e, &trace.request_id, "experiments.get"))?
        .map(|experiment| Json(ExperimentResponse { experiment }))
        .ok_or_else(|| missing(&trace))
}

pub(crate) async fn update_experiment_handler(
    State(state): State<AppState>,
    trace: RequestTrace,
    Path(raw_id): Path<String>,
    ValidatedJson(body): ValidatedJson<UpdateExperimentRequest>,
) -> Result<Json<ExperimentResponse>, ApiFailure> {
    let id = experiment_id(&raw_id, &trace)?;
    let patch = body
        .validate()
        .map_err(|e| ApiFailure(e.with_request_id(&trace.request_id)))?;
    experiments::update(&state, id, patch)
        .await
        .map_err(|e| internal_failure(&e, &trace.request_id, "experiments.update"))?
        .map(|experiment| Json(ExperimentResponse { experiment }))
        .ok_or_else(|| missing(&trace))
}

pub(crate) async fn delete_experiment_handler(
    State(state): State<AppState>,
    trace: RequestTrace,
    Path(raw_id): Path<String>,
) -> Result<Json<AckResponse>, ApiFailure> {
    let id = experiment_id(&raw_id, &trace)?;
    let deleted = experiments::delete(&state, id)
        .await
        .map_err(|e| internal_failure(&e, &trace.request_id, "experiments.delete"))?;
    if deleted {
        Ok(Json(AckResponse::ok()))
    } else {
        Err(missing(&trace))
    }
}

pub(crate) async fn dashboard_handler(
    State(state): State<AppState>,
    trace: RequestTrace,
    Query(query): Query<ReportQuery>,
) -> Result<Json<DashboardReport>, ApiFailure> {
    let range = ReportRange::parse_or_default(query.range.as_deref());
    let report = reports::dashboard(&state, range)
        .await
        .map_err(|e| internal_failure(&e, &trace.request_id, "analytics.dashboard"))?;
    Ok(Json(report))
}
