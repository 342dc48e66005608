// SPDX-License-Identifier: Apache-2.0

use super::{with_store, ServiceError};
use crate::AppState;
use chrono::{DateTime, Utc};
use folio_api::AbTestCommand;
use folio_core::{evaluate, ready_for_evaluation};
use folio_model::{Arm, Experiment, ExperimentId, ExperimentPatch, NewExperiment, Significance};
use folio_store::{AssignOutcome, ConvertOutcome, SqliteStore, StoreError};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ConversionResult {
    Recorded {
        counted: bool,
        significance: Option<Significance>,
    },
    Unavailable,
}

/// Re-evaluates significance once both arms carry enough views and persists
/// the result. Returns `None` while the sample is too small.
fn refresh_significance(
    store: &SqliteStore,
    experiment: &Experiment,
    now: DateTime<Utc>,
) -> Result<Option<Significance>, StoreError> {
    let control = experiment.counts(Arm::Control);
    let variant = experiment.counts(Arm::Variant);
    if !ready_for_evaluation(control, variant) {
        return Ok(None);
    }
    let Some(significance) = evaluate(control, variant) else {
        return Ok(None);
    };
    store.record_significance(&experiment.id, &significance, now)?;
    Ok(Some(significance))
}

pub(crate) async fn assign(
    state: &AppState,
    cmd: AbTestCommand,
) -> Result<AssignOutcome, ServiceError> {
    let counting = state.api.view_counting;
    let name = cmd.experiment_name.clone();
    let now = Utc::now();
    let outcome = with_store(&state.store, move |store| {
        store.assign(
            &cmd.session_id,
            &cmd.experiment_name,
            &cmd.variant,
            counting,
            now,
        )
    })
    .await?;
    match &outcome {
        AssignOutcome::Assigned(receipt) => debug!(
            experiment = %name,
            arm = %receipt.arm,
            reassigned = receipt.reassigned,
            view_counted = receipt.view_counted,
            "assignment recorded"
        ),
        AssignOutcome::Unavailable => debug!(experiment = %name, "assign skipped: experiment unavailable"),
    }
    Ok(outcome)
}

pub(crate) async fn convert(
    state: &AppState,
    cmd: AbTestCommand,
) -> Result<ConversionResult, ServiceError> {
    let name = cmd.experiment_name.clone();
    let now = Utc::now();
    let result = with_store(&state.store, move |store| {
        match store.convert(&cmd.session_id, &cmd.experiment_name, &cmd.variant, now)? {
            ConvertOutcome::Unavailable => Ok(ConversionResult::Unavailable),
            ConvertOutcome::Converted {
                experiment,
                counted,
                ..
            } => Ok(ConversionResult::Recorded {
                counted,
                significance: refresh_significance(store, &experiment, now)?,
            }),
        }
    })
    .await?;
    if let ConversionResult::Recorded {
        counted,
        significance: Some(sig),
    } = &result
    {
        if sig.is_significant {
            info!(
                experiment = %name,
                p_value = sig.p_value,
                winner = sig.winner.map_or("none", Arm::as_str),
                counted = *counted,
                "experiment is significant"
            );
        }
    }
    Ok(result)
}

pub(crate) async fn list(state: &AppState) -> Result<Vec<Experiment>, ServiceError> {
    with_store(&state.store, SqliteStore::list_experiments).await
}

pub(crate) async fn get(
    state: &AppState,
    id: ExperimentId,
) -> Result<Option<Experiment>, ServiceError> {
    with_store(&state.store, move |store| store.get_experiment(&id)).await
}

pub(crate) async fn create(
    state: &AppState,
    new: NewExperiment,
) -> Result<Experiment, ServiceError> {
    let now = Utc::now();
    let experiment =
        with_store(&state.store, move |store| store.create_experiment(&new, now)).await?;
    info!(id = %experiment.id, name = %experiment.name, "experiment created");
    Ok(experiment)
}

pub(crate) async fn update(
    state: &AppState,
    id: ExperimentId,
    patch: ExperimentPatch,
) -> Result<Option<Experiment>, ServiceError> {
    let now = Utc::now();
    let toggled = patch.is_active;
    let updated =
        with_store(&state.store, move |store| store.update_experiment(&id, &patch, now)).await?;
    if let (Some(experiment), Some(active)) = (&updated, toggled) {
        info!(id = %experiment.id, active, "experiment activation changed");
    }
    Ok(updated)
}

pub(crate) async fn delete(state: &AppState, id: ExperimentId) -> Result<bool, ServiceError> {
    let deleted = with_store(&state.store, move |store| store.delete_experiment(&id)).await?;
    Ok(deleted)
}
