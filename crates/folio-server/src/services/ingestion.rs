// SPDX-License-Identifier: Apache-2.0

use super::{with_store, ServiceError};
use crate::AppState;
use chrono::{DateTime, Utc};
use folio_api::SessionCommand;
use folio_core::{BudgetViolation, PerformanceBudget};
use folio_model::{
    ConversionEvent, EngagementEvent, PageView, PerformanceSample, SessionAction, SessionStart,
};
use tracing::{debug, warn};

/// Applies a session start or end. Ending an unknown session is a no-op.
pub(crate) async fn apply_session(
    state: &AppState,
    cmd: SessionCommand,
    user_agent: Option<String>,
    now: DateTime<Utc>,
) -> Result<(), ServiceError> {
    match cmd.action {
        SessionAction::Start => {
            let profile = state
                .classifier
                .classify(user_agent.as_deref().unwrap_or_default());
            let start = SessionStart {
                session_id: cmd.session_id,
                page: cmd.page.unwrap_or_default(),
                referrer: cmd.referrer,
                user_agent,
                profile,
                at: now,
            };
            with_store(&state.store, move |store| store.start_session(&start)).await
        }
        SessionAction::End => {
            let session_id = cmd.session_id;
            let exit_page = cmd.page;
            let ended = with_store(&state.store, move |store| {
                store.end_session(&session_id, exit_page.as_deref(), now)
            })
            .await?;
            match ended {
                Some(s) => debug!(
                    session_id = %s.session_id,
                    duration_secs = s.duration.unwrap_or_default(),
                    page_views = s.page_views,
                    "session ended"
                ),
                None => debug!("session end ignored: unknown session"),
            }
            Ok(())
        }
    }
}

pub(crate) async fn record_page_view(state: &AppState, view: PageView) -> Result<(), ServiceError> {
    with_store(&state.store, move |store| store.record_page_view(&view)).await
}

/// Emits one structured warning per breached budget.
pub(crate) fn report_budget_violations(
    budget: &PerformanceBudget,
    sample: &PerformanceSample,
) -> Vec<BudgetViolation> {
    let violations = budget.check(&sample.vitals);
    for v in &violations {
        warn!(
            target: "folio_perf_budget",
            session_id = %sample.session_id,
            page = %sample.page,
            metric = v.metric.as_str(),
            value = v.value,
            threshold = v.threshold,
            severity = v.severity.as_str(),
            "performance budget exceeded"
        );
    }
    violations
}

pub(crate) async fn record_performance(
    state: &AppState,
    sample: PerformanceSample,
) -> Result<Vec<BudgetViolation>, ServiceError> {
    let violations = report_budget_violations(&state.api.budget, &sample);
    with_store(&state.store, move |store| store.record_performance(&sample)).await?;
    Ok(violations)
}

pub(crate) async fn record_engagement(
    state: &AppState,
    event: EngagementEvent,
) -> Result<(), ServiceError> {
    with_store(&state.store, move |store| store.record_engagement(&event)).await
}

pub(crate) async fn record_conversion(
    state: &AppState,
    event: ConversionEvent,
) -> Result<(), ServiceError> {
    let flagged = with_store(&state.store, move |store| store.record_conversion(&event)).await?;
    if !flagged {
        debug!("conversion stored without a matching session");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use folio_core::Severity;
    use folio_model::{SessionId, WebVital, WebVitals};

    #[test]
    fn violations_are_graded_against_the_configured_budget() {
        let sample = PerformanceSample {
            session_id: SessionId::parse("session_perf").expect("sid"),
            page: "/".to_string(),
            vitals: WebVitals {
                lcp: Some(4000.0),
                ttfb: Some(900.0),
                cls: Some(0.05),
                ..WebVitals::default()
            },
            connection: None,
            occurred_at: Utc.timestamp_millis_opt(1_000).single().expect("ts"),
        };
        let violations = report_budget_violations(&PerformanceBudget::default(), &sample);
        let graded: Vec<(WebVital, Severity)> =
            violations.iter().map(|v| (v.metric, v.severity)).collect();
        assert_eq!(
            graded,
            vec![(WebVital::Lcp, Severity::High), (WebVital::Ttfb, Severity::Medium)]
        );
    }
}
