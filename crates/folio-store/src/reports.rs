// SPDX-License-Identifier: Apache-2.0

//! Admin dashboard aggregates.

use crate::codec::to_millis;
use crate::{SqliteStore, StoreError};
use chrono::{DateTime, Utc};
use folio_core::{calculate_trend, percent_of, ReportRange};
use folio_model::{Arm, Experiment};
use rusqlite::{params, Connection};
use serde::Serialize;

pub const TOP_PAGES_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub total_views: u64,
    pub unique_visitors: u64,
    pub avg_session_duration: u64,
    pub bounce_rate: u64,
    pub conversion_rate: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trends {
    pub views_change: i64,
    pub visitors_change: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageStat {
    pub path: String,
    pub views: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DeviceShare {
    pub desktop: u64,
    pub mobile: u64,
    pub tablet: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct AverageVitals {
    pub lcp: f64,
    pub fid: f64,
    pub cls: f64,
    pub fcp: f64,
    pub ttfb: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentSummary {
    pub name: String,
    pub control_views: u64,
    pub variant_views: u64,
    pub control_conversions: u64,
    pub variant_conversions: u64,
    pub p_value: Option<f64>,
    pub is_significant: bool,
    pub winner: Option<Arm>,
}

impl From<&Experiment> for ExperimentSummary {
    fn from(e: &Experiment) -> Self {
        Self {
            name: e.name.to_string(),
            control_views: e.control_views,
            variant_views: e.variant_views,
            control_conversions: e.control_conversions,
            variant_conversions: e.variant_conversions,
            p_value: e.p_value,
            is_significant: e.is_significant,
            winner: e.winner,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardReport {
    pub range: String,
    pub overview: Overview,
    pub trends: Trends,
    pub top_pages: Vec<PageStat>,
    pub device_stats: DeviceShare,
    pub performance_metrics: AverageVitals,
    pub ab_test_results: Vec<ExperimentSummary>,
}

fn count(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<u64, StoreError> {
    let n: i64 = conn.query_row(sql, params, |row| row.get(0))?;
    Ok(u64::try_from(n).unwrap_or(0))
}

fn views_between(conn: &Connection, from: i64, until: Option<i64>) -> Result<(u64, u64), StoreError> {
    let until = until.unwrap_or(i64::MAX);
    let views = count(
        conn,
        "SELECT COUNT(*) FROM page_views WHERE occurred_at >= ?1 AND occurred_at < ?2",
        params![from, until],
    )?;
    let visitors = count(
        conn,
        "SELECT COUNT(DISTINCT session_id) FROM page_views WHERE occurred_at >= ?1 AND occurred_at < ?2",
        params![from, until],
    )?;
    Ok((views, visitors))
}

impl SqliteStore {
    pub fn dashboard(
        &self,
        range: ReportRange,
        now: DateTime<Utc>,
    ) -> Result<DashboardReport, StoreError> {
        let (previous_start, current_start) = range.windows(now);
        let (previous_start, current_start) = (to_millis(previous_start), to_millis(current_start));
        self.with_conn(|conn| {
            let (total_views, unique_visitors) = views_between(conn, current_start, None)?;
            let (previous_views, previous_visitors) =
                views_between(conn, previous_start, Some(current_start))?;

            let avg_duration: Option<f64> = conn.query_row(
                "SELECT AVG(duration) FROM sessions WHERE start_time >= ?1 AND duration IS NOT NULL",
                params![current_start],
                |row| row.get(0),
            )?;
            let sessions = count(
                conn,
                "SELECT COUNT(*) FROM sessions WHERE start_time >= ?1",
                params![current_start],
            )?;
            let bounced = count(
                conn,
                "SELECT COUNT(*) FROM sessions WHERE start_time >= ?1 AND page_views <= 1",
                params![current_start],
            )?;
            let converted = count(
                conn,
                "SELECT COUNT(*) FROM sessions WHERE start_time >= ?1 AND has_converted = 1",
                params![current_start],
            )?;

            let mut stmt = conn.prepare(
                "SELECT path, COUNT(*) AS views FROM page_views WHERE occurred_at >= ?1
                 GROUP BY path ORDER BY views DESC, path ASC LIMIT ?2",
            )?;
            let top_pages = stmt
                .query_map(params![current_start, TOP_PAGES_LIMIT as i64], |row| {
                    let views: i64 = row.get(1)?;
                    Ok(PageStat {
                        path: row.get(0)?,
                        views: u64::try_from(views).unwrap_or(0),
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            let mut stmt = conn.prepare(
                "SELECT device, COUNT(*) FROM page_views WHERE occurred_at >= ?1 GROUP BY device",
            )?;
            let mut devices = DeviceShare::default();
            let by_device = stmt
                .query_map(params![current_start], |row| {
                    let n: i64 = row.get(1)?;
                    Ok((row.get::<_, String>(0)?, u64::try_from(n).unwrap_or(0)))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            let device_total: u64 = by_device.iter().map(|(_, n)| n).sum();
            for (device, n) in by_device {
                let share = percent_of(n, device_total);
                match device.as_str() {
                    "desktop" => devices.desktop = share,
                    "mobile" => devices.mobile = share,
                    "tablet" => devices.tablet = share,
                    _ => {}
                }
            }

            let vitals = conn.query_row(
                "SELECT AVG(lcp), AVG(fid), AVG(cls), AVG(fcp), AVG(ttfb)
                 FROM performance_metrics WHERE occurred_at >= ?1",
                params![current_start],
                |row| {
                    Ok(AverageVitals {
                        lcp: row.get::<_, Option<f64>>(0)?.unwrap_or(0.0),
                        fid: row.get::<_, Option<f64>>(1)?.unwrap_or(0.0),
                        cls: row.get::<_, Option<f64>>(2)?.unwrap_or(0.0),
                        fcp: row.get::<_, Option<f64>>(3)?.unwrap_or(0.0),
                        ttfb: row.get::<_, Option<f64>>(4)?.unwrap_or(0.0),
                    })
                },
            )?;

            Ok((
                Overview {
                    total_views,
                    unique_visitors,
                    avg_session_duration: avg_duration.map_or(0, |d| d.round().max(0.0) as u64),
                    bounce_rate: percent_of(bounced, sessions),
                    conversion_rate: percent_of(converted, sessions),
                },
                Trends {
                    views_change: calculate_trend(total_views, previous_views),
                    visitors_change: calculate_trend(unique_visitors, previous_visitors),
                },
                top_pages,
                devices,
                vitals,
            ))
        })
        .and_then(|(overview, trends, top_pages, device_stats, performance_metrics)| {
            let ab_test_results = self
                .active_experiments()?
                .iter()
                .map(ExperimentSummary::from)
                .collect();
            Ok(DashboardReport {
                range: range.as_str().to_string(),
                overview,
                trends,
                top_pages,
                device_stats,
                performance_metrics,
                ab_test_results,
            })
        })
    }
}
