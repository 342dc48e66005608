// SPDX-License-Identifier: Apache-2.0

use crate::codec::{count_at, opt_time_at, parsed_at, time_at, to_millis};
use crate::{SqliteStore, StoreError};
use chrono::{DateTime, Utc};
use folio_model::{
    whole_seconds_between, ConversionEvent, DeviceClass, EngagementEvent, PageView,
    PerformanceSample, SessionId, SessionRecord, SessionStart,
};
use rusqlite::{params, OptionalExtension, Row};

const SESSION_COLUMNS: &str = "session_id, start_time, end_time, duration, is_active, entry_page, \
     exit_page, referrer, user_agent, device, browser, os, page_views, has_converted, \
     conversion_type, conversion_value";

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<SessionRecord> {
    let device: Option<String> = row.get(9)?;
    Ok(SessionRecord {
        session_id: parsed_at(row, 0, SessionId::parse)?,
        start_time: time_at(row, 1)?,
        end_time: opt_time_at(row, 2)?,
        duration: row.get(3)?,
        is_active: row.get(4)?,
        entry_page: row.get(5)?,
        exit_page: row.get(6)?,
        referrer: row.get(7)?,
        user_agent: row.get(8)?,
        device: device.as_deref().and_then(DeviceClass::from_label),
        browser: row.get(10)?,
        os: row.get(11)?,
        page_views: count_at(row, 12)?,
        has_converted: row.get(13)?,
        conversion_type: row.get(14)?,
        conversion_value: row.get(15)?,
    })
}

fn metadata_text(metadata: Option<&serde_json::Value>) -> Result<Option<String>, StoreError> {
    Ok(metadata.map(serde_json::to_string).transpose()?)
}

impl SqliteStore {
    /// Creates the session or reactivates it, refreshing entry details.
    /// `start_time` and `page_views` are only set on insert.
    pub fn start_session(&self, start: &SessionStart) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (
                   session_id, start_time, is_active, entry_page, referrer, user_agent,
                   device, browser, os, page_views
                 ) VALUES (?1, ?2, 1, ?3, ?4, ?5, ?6, ?7, ?8, 0)
                 ON CONFLICT(session_id) DO UPDATE SET
                   is_active = 1,
                   entry_page = excluded.entry_page,
                   referrer = excluded.referrer,
                   user_agent = excluded.user_agent,
                   device = excluded.device,
                   browser = excluded.browser,
                   os = excluded.os",
                params![
                    start.session_id.as_str(),
                    to_millis(start.at),
                    start.page,
                    start.referrer,
                    start.user_agent,
                    start.profile.device.as_str(),
                    start.profile.browser,
                    start.profile.os,
                ],
            )?;
            Ok(())
        })
    }

    /// Closes a session. Unknown ids are a no-op and return `None`.
    pub fn end_session(
        &self,
        session_id: &SessionId,
        exit_page: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionRecord>, StoreError> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE session_id = ?1");
            let Some(session) = conn
                .query_row(&sql, params![session_id.as_str()], session_from_row)
                .optional()?
            else {
                return Ok(None);
            };
            let duration = whole_seconds_between(session.start_time, now);
            conn.execute(
                "UPDATE sessions SET end_time = ?2, duration = ?3, is_active = 0,
                   exit_page = COALESCE(?4, exit_page)
                 WHERE session_id = ?1",
                params![session_id.as_str(), to_millis(now), duration, exit_page],
            )?;
            Ok(Some(SessionRecord {
                end_time: Some(now),
                duration: Some(duration),
                is_active: false,
                exit_page: exit_page.map(str::to_string).or(session.exit_page.clone()),
                ..session
            }))
        })
    }

    pub fn get_session(&self, session_id: &SessionId) -> Result<Option<SessionRecord>, StoreError> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE session_id = ?1");
            Ok(conn
                .query_row(&sql, params![session_id.as_str()], session_from_row)
                .optional()?)
        })
    }

    /// Appends the view, then bumps the owning session's counter as a
    /// separate write. A missing session leaves the counter untouched.
    pub fn record_page_view(&self, view: &PageView) -> Result<(), StoreError> {
        let metadata = metadata_text(view.metadata.as_ref())?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO page_views (session_id, path, title, referrer, device, metadata, occurred_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    view.session_id.as_str(),
                    view.path,
                    view.title,
                    view.referrer,
                    view.device.as_str(),
                    metadata,
                    to_millis(view.occurred_at),
                ],
            )?;
            conn.execute(
                "UPDATE sessions SET page_views = page_views + 1 WHERE session_id = ?1",
                params![view.session_id.as_str()],
            )?;
            Ok(())
        })
    }

    pub fn record_performance(&self, sample: &PerformanceSample) -> Result<(), StoreError> {
        let connection = sample.connection.clone().unwrap_or_default();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO performance_metrics (
                   session_id, page, lcp, fid, cls, fcp, ttfb, effective_type, downlink, rtt, occurred_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    sample.session_id.as_str(),
                    sample.page,
                    sample.vitals.lcp,
                    sample.vitals.fid,
                    sample.vitals.cls,
                    sample.vitals.fcp,
                    sample.vitals.ttfb,
                    connection.effective_type,
                    connection.downlink,
                    connection.rtt,
                    to_millis(sample.occurred_at),
                ],
            )?;
            Ok(())
        })
    }

    pub fn record_engagement(&self, event: &EngagementEvent) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO engagement_events (session_id, page, event, time_on_page, scroll_depth, occurred_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    event.session_id.as_str(),
                    event.page,
                    event.event,
                    event.time_on_page_ms,
                    event.scroll_depth,
                    to_millis(event.occurred_at),
                ],
            )?;
            Ok(())
        })
    }

    /// Appends the conversion and flags the owning session when it exists.
    /// Returns whether a session was flagged.
    pub fn record_conversion(&self, event: &ConversionEvent) -> Result<bool, StoreError> {
        let metadata = metadata_text(event.metadata.as_ref())?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO conversion_events (session_id, conversion_type, value, page, metadata, occurred_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    event.session_id.as_str(),
                    event.conversion_type,
                    event.value,
                    event.page,
                    metadata,
                    to_millis(event.occurred_at),
                ],
            )?;
            let flagged = conn.execute(
                "UPDATE sessions SET has_converted = 1, conversion_type = ?2, conversion_value = ?3
                 WHERE session_id = ?1",
                params![
                    event.session_id.as_str(),
                    event.conversion_type,
                    event.value
                ],
            )?;
            Ok(flagged > 0)
        })
    }

    /// Row counts of the append-only event tables, keyed by table name.
    pub fn event_counts(&self) -> Result<Vec<(&'static str, u64)>, StoreError> {
        self.with_conn(|conn| {
            let mut out = Vec::new();
            for table in [
                "page_views",
                "performance_metrics",
                "engagement_events",
                "conversion_events",
            ] {
                let n: i64 =
                    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
                out.push((table, u64::try_from(n).unwrap_or(0)));
            }
            Ok(out)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use folio_model::ClientProfile;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).single().expect("ts")
    }

    fn start(store: &SqliteStore, id: &str, ms: i64) {
        store
            .start_session(&SessionStart {
                session_id: SessionId::parse(id).expect("sid"),
                page: "/".to_string(),
                referrer: Some("https://example.com".to_string()),
                user_agent: Some("curl/8".to_string()),
                profile: ClientProfile::default(),
                at: at(ms),
            })
            .expect("start");
    }

    #[test]
    fn end_computes_whole_second_duration() {
        let store = SqliteStore::open_in_memory().expect("open");
        start(&store, "session_1", 10_000);
        let ended = store
            .end_session(
                &SessionId::parse("session_1").expect("sid"),
                Some("/contact"),
                at(75_400),
            )
            .expect("end")
            .expect("known session");
        assert_eq!(ended.duration, Some(65));
        assert!(!ended.is_active);
        assert_eq!(ended.exit_page.as_deref(), Some("/contact"));
        let stored = store
            .get_session(&ended.session_id)
            .expect("get")
            .expect("exists");
        assert_eq!(stored, ended);
    }

    #[test]
    fn restart_keeps_original_start_time_and_counter() {
        let store = SqliteStore::open_in_memory().expect("open");
        start(&store, "session_1", 10_000);
        store
            .record_page_view(&PageView {
                session_id: SessionId::parse("session_1").expect("sid"),
                path: "/about".to_string(),
                title: None,
                referrer: None,
                device: DeviceClass::Desktop,
                metadata: None,
                occurred_at: at(11_000),
            })
            .expect("view");
        start(&store, "session_1", 20_000);
        let s = store
            .get_session(&SessionId::parse("session_1").expect("sid"))
            .expect("get")
            .expect("exists");
        assert_eq!(s.start_time, at(10_000));
        assert_eq!(s.page_views, 1);
        assert!(s.is_active);
    }

    #[test]
    fn conversion_without_session_is_still_recorded() {
        let store = SqliteStore::open_in_memory().expect("open");
        let flagged = store
            .record_conversion(&ConversionEvent {
                session_id: SessionId::parse("session_9").expect("sid"),
                conversion_type: "contact_form".to_string(),
                value: Some(1.0),
                page: "/contact".to_string(),
                metadata: None,
                occurred_at: at(1_000),
            })
            .expect("conversion");
        assert!(!flagged);
        let counts = store.event_counts().expect("counts");
        assert!(counts.contains(&("conversion_events", 1)));
    }
}
