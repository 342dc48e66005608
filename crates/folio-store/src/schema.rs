// SPDX-License-Identifier: Apache-2.0

//! Schema migrations tracked through `PRAGMA user_version`.

use crate::StoreError;
use rusqlite::Connection;
use std::time::Duration;

pub const SCHEMA_VERSION: u32 = 2;
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const V001_EXPERIMENTS: &str = "
CREATE TABLE experiments (
  id TEXT PRIMARY KEY,
  name TEXT NOT NULL UNIQUE,
  description TEXT NOT NULL DEFAULT '',
  is_active INTEGER NOT NULL DEFAULT 0,
  traffic_split INTEGER NOT NULL DEFAULT 50 CHECK (traffic_split BETWEEN 0 AND 100),
  target_pages TEXT NOT NULL DEFAULT '[]',
  component TEXT,
  control_version TEXT NOT NULL DEFAULT '{}',
  variant_version TEXT NOT NULL DEFAULT '{}',
  primary_goal TEXT,
  success_metric TEXT,
  control_views INTEGER NOT NULL DEFAULT 0,
  variant_views INTEGER NOT NULL DEFAULT 0,
  control_conversions INTEGER NOT NULL DEFAULT 0,
  variant_conversions INTEGER NOT NULL DEFAULT 0,
  confidence_level REAL,
  p_value REAL,
  is_significant INTEGER NOT NULL DEFAULT 0,
  winner TEXT,
  start_date INTEGER,
  end_date INTEGER,
  created_at INTEGER NOT NULL,
  updated_at INTEGER NOT NULL
);
CREATE TABLE assignments (
  id TEXT PRIMARY KEY,
  experiment_id TEXT NOT NULL REFERENCES experiments(id) ON DELETE CASCADE,
  session_id TEXT NOT NULL,
  variant TEXT NOT NULL,
  has_converted INTEGER NOT NULL DEFAULT 0,
  converted_at INTEGER,
  created_at INTEGER NOT NULL,
  updated_at INTEGER NOT NULL,
  UNIQUE (experiment_id, session_id)
);
CREATE INDEX idx_assignments_session ON assignments(session_id);
";

const V002_ANALYTICS: &str = "
CREATE TABLE sessions (
  session_id TEXT PRIMARY KEY,
  start_time INTEGER NOT NULL,
  end_time INTEGER,
  duration INTEGER,
  is_active INTEGER NOT NULL DEFAULT 1,
  entry_page TEXT,
  exit_page TEXT,
  referrer TEXT,
  user_agent TEXT,
  device TEXT,
  browser TEXT,
  os TEXT,
  page_views INTEGER NOT NULL DEFAULT 0,
  has_converted INTEGER NOT NULL DEFAULT 0,
  conversion_type TEXT,
  conversion_value REAL
);
CREATE INDEX idx_sessions_start ON sessions(start_time);
CREATE TABLE page_views (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  session_id TEXT NOT NULL,
  path TEXT NOT NULL,
  title TEXT,
  referrer TEXT,
  device TEXT NOT NULL,
  metadata TEXT,
  occurred_at INTEGER NOT NULL
);
CREATE INDEX idx_page_views_time ON page_views(occurred_at);
CREATE INDEX idx_page_views_session ON page_views(session_id);
CREATE TABLE performance_metrics (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  session_id TEXT NOT NULL,
  page TEXT NOT NULL,
  lcp REAL,
  fid REAL,
  cls REAL,
  fcp REAL,
  ttfb REAL,
  effective_type TEXT,
  downlink REAL,
  rtt REAL,
  occurred_at INTEGER NOT NULL
);
CREATE INDEX idx_performance_time ON performance_metrics(occurred_at);
CREATE TABLE engagement_events (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  session_id TEXT NOT NULL,
  page TEXT NOT NULL,
  event TEXT NOT NULL,
  time_on_page INTEGER,
  scroll_depth INTEGER,
  occurred_at INTEGER NOT NULL
);
CREATE TABLE conversion_events (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  session_id TEXT NOT NULL,
  conversion_type TEXT NOT NULL,
  value REAL,
  page TEXT NOT NULL,
  metadata TEXT,
  occurred_at INTEGER NOT NULL
);
";

const MIGRATIONS: &[(&str, u32)] = &[(V001_EXPERIMENTS, 1), (V002_ANALYTICS, 2)];

pub(crate) fn apply_pragmas(conn: &Connection, on_disk: bool) -> Result<(), StoreError> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.pragma_update(None, "foreign_keys", true)?;
    if on_disk {
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::debug!(journal_mode = %mode, "sqlite journal mode");
        conn.pragma_update(None, "synchronous", "NORMAL")?;
    }
    Ok(())
}

pub fn current_version(conn: &Connection) -> Result<u32, StoreError> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

/// Applies every migration newer than the stored `user_version`.
pub(crate) fn run_migrations(conn: &mut Connection) -> Result<(), StoreError> {
    let current = current_version(conn)?;
    if current > SCHEMA_VERSION {
        return Err(StoreError::MigrationFailed {
            version: current,
            message: format!("database schema is newer than supported version {SCHEMA_VERSION}"),
        });
    }
    for (sql, version) in MIGRATIONS {
        if current >= *version {
            continue;
        }
        let failed = |e: rusqlite::Error| StoreError::MigrationFailed {
            version: *version,
            message: e.to_string(),
        };
        let tx = conn.transaction().map_err(failed)?;
        tx.execute_batch(sql).map_err(failed)?;
        tx.pragma_update(None, "user_version", version)
            .map_err(failed)?;
        tx.commit().map_err(failed)?;
        tracing::info!(version = *version, "applied schema migration");
    }
    Ok(())
}
