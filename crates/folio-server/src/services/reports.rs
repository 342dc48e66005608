// SPDX-License-Identifier: Apache-2.0

use super::{with_store, ServiceError};
use crate::AppState;
use chrono::Utc;
use folio_core::ReportRange;
use folio_store::DashboardReport;

pub(crate) async fn dashboard(
    state: &AppState,
    range: ReportRange,
) -> Result<DashboardReport, ServiceError> {
    let now = Utc::now();
    with_store(&state.store, move |store| store.dashboard(range, now)).await
}
