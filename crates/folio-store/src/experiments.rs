// SPDX-License-Identifier: Apache-2.0

use crate::codec::{count_at, json_at, opt_time_at, parsed_at, time_at, to_millis};
use crate::{SqliteStore, StoreError};
use chrono::{DateTime, Utc};
use folio_model::{
    Arm, Assignment, Experiment, ExperimentId, ExperimentName, ExperimentPatch, NewExperiment,
    SessionId, Significance, TrafficSplit, VariantLabel,
};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior};

/// When an assignment counts as a view of its arm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ViewCounting {
    /// Every successful assign call increments the arm's view counter,
    /// including repeat calls for an already-assigned session.
    #[default]
    EveryAssignment,
    /// Only the call that creates the assignment row counts.
    FirstAssignment,
}

impl ViewCounting {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EveryAssignment => "every",
            Self::FirstAssignment => "first",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignReceipt {
    pub experiment_id: ExperimentId,
    pub arm: Arm,
    pub reassigned: bool,
    pub view_counted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignOutcome {
    Assigned(AssignReceipt),
    /// No experiment with that name, or it is inactive. Nothing was written.
    Unavailable,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConvertOutcome {
    /// `counted` is false only when every assignment row for the session
    /// was already converted. An unassigned session is still counted.
    Converted {
        experiment: Experiment,
        converted_rows: usize,
        counted: bool,
    },
    Unavailable,
}

const EXPERIMENT_COLUMNS: &str = "id, name, description, is_active, traffic_split, target_pages, \
     component, control_version, variant_version, primary_goal, success_metric, control_views, \
     variant_views, control_conversions, variant_conversions, confidence_level, p_value, \
     is_significant, winner, start_date, end_date, created_at, updated_at";

const ASSIGNMENT_COLUMNS: &str =
    "id, experiment_id, session_id, variant, has_converted, converted_at, created_at, updated_at";

fn experiment_from_row(row: &Row<'_>) -> rusqlite::Result<Experiment> {
    let split: i64 = row.get(4)?;
    let winner: Option<String> = row.get(18)?;
    Ok(Experiment {
        id: parsed_at(row, 0, ExperimentId::parse)?,
        name: parsed_at(row, 1, ExperimentName::parse)?,
        description: row.get(2)?,
        is_active: row.get(3)?,
        traffic_split: TrafficSplit::new(split).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Integer, Box::new(e))
        })?,
        target_pages: json_at(row, 5)?,
        component: row.get(6)?,
        control_version: json_at(row, 7)?,
        variant_version: json_at(row, 8)?,
        primary_goal: row.get(9)?,
        success_metric: row.get(10)?,
        control_views: count_at(row, 11)?,
        variant_views: count_at(row, 12)?,
        control_conversions: count_at(row, 13)?,
        variant_conversions: count_at(row, 14)?,
        confidence_level: row.get(15)?,
        p_value: row.get(16)?,
        is_significant: row.get(17)?,
        winner: winner.as_deref().map(Arm::parse).transpose().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(18, rusqlite::types::Type::Text, Box::new(e))
        })?,
        start_date: opt_time_at(row, 19)?,
        end_date: opt_time_at(row, 20)?,
        created_at: time_at(row, 21)?,
        updated_at: time_at(row, 22)?,
    })
}

fn assignment_from_row(row: &Row<'_>) -> rusqlite::Result<Assignment> {
    Ok(Assignment {
        id: row.get(0)?,
        experiment_id: parsed_at(row, 1, ExperimentId::parse)?,
        session_id: parsed_at(row, 2, SessionId::parse)?,
        variant: row.get(3)?,
        has_converted: row.get(4)?,
        converted_at: opt_time_at(row, 5)?,
        created_at: time_at(row, 6)?,
        updated_at: time_at(row, 7)?,
    })
}

fn views_column(arm: Arm) -> &'static str {
    match arm {
        Arm::Control => "control_views",
        Arm::Variant => "variant_views",
    }
}

fn conversions_column(arm: Arm) -> &'static str {
    match arm {
        Arm::Control => "control_conversions",
        Arm::Variant => "variant_conversions",
    }
}

fn fetch_experiment(conn: &Connection, id: &str) -> Result<Option<Experiment>, StoreError> {
    let sql = format!("SELECT {EXPERIMENT_COLUMNS} FROM experiments WHERE id = ?1");
    Ok(conn
        .query_row(&sql, params![id], experiment_from_row)
        .optional()?)
}

fn active_experiment_id(conn: &Connection, name: &ExperimentName) -> Result<Option<String>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT id FROM experiments WHERE name = ?1 AND is_active = 1",
            params![name.as_str()],
            |row| row.get(0),
        )
        .optional()?)
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

impl SqliteStore {
    pub fn create_experiment(
        &self,
        new: &NewExperiment,
        now: DateTime<Utc>,
    ) -> Result<Experiment, StoreError> {
        let id = ExperimentId::generate();
        let target_pages = serde_json::to_string(&new.target_pages)?;
        let control_version = serde_json::to_string(&new.control_version)?;
        let variant_version = serde_json::to_string(&new.variant_version)?;
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO experiments (
                   id, name, description, is_active, traffic_split, target_pages, component,
                   control_version, variant_version, primary_goal, success_metric,
                   created_at, updated_at
                 ) VALUES (?1, ?2, ?3, 0, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
                params![
                    id.as_str(),
                    new.name.as_str(),
                    new.description,
                    i64::from(new.traffic_split.percent()),
                    target_pages,
                    new.component,
                    control_version,
                    variant_version,
                    new.primary_goal,
                    new.success_metric,
                    to_millis(now),
                ],
            );
            match inserted {
                Ok(_) => {}
                Err(e) if is_unique_violation(&e) => {
                    return Err(StoreError::DuplicateName {
                        name: new.name.to_string(),
                    })
                }
                Err(e) => return Err(e.into()),
            }
            fetch_experiment(conn, id.as_str())?.ok_or(StoreError::Sqlite(
                rusqlite::Error::QueryReturnedNoRows,
            ))
        })
    }

    pub fn list_experiments(&self) -> Result<Vec<Experiment>, StoreError> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {EXPERIMENT_COLUMNS} FROM experiments ORDER BY created_at DESC, name ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], experiment_from_row)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }

    pub fn active_experiments(&self) -> Result<Vec<Experiment>, StoreError> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {EXPERIMENT_COLUMNS} FROM experiments WHERE is_active = 1 ORDER BY name ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], experiment_from_row)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }

    pub fn get_experiment(&self, id: &ExperimentId) -> Result<Option<Experiment>, StoreError> {
        self.with_conn(|conn| fetch_experiment(conn, id.as_str()))
    }

    pub fn find_experiment_by_name(
        &self,
        name: &ExperimentName,
    ) -> Result<Option<Experiment>, StoreError> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {EXPERIMENT_COLUMNS} FROM experiments WHERE name = ?1");
            Ok(conn
                .query_row(&sql, params![name.as_str()], experiment_from_row)
                .optional()?)
        })
    }

    /// Applies a partial update. Activation stamps `start_date` and clears
    /// `end_date`; deactivation stamps `end_date`. Returns `None` for an
    /// unknown id.
    pub fn update_experiment(
        &self,
        id: &ExperimentId,
        patch: &ExperimentPatch,
        now: DateTime<Utc>,
    ) -> Result<Option<Experiment>, StoreError> {
        let target_pages = patch
            .target_pages
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let control_version = patch
            .control_version
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let variant_version = patch
            .variant_version
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let Some(current) = fetch_experiment(&tx, id.as_str())? else {
                return Ok(None);
            };
            let now_ms = to_millis(now);
            let (start_date, end_date) = match patch.is_active {
                Some(true) if !current.is_active => (Some(now_ms), None),
                Some(false) if current.is_active => {
                    (current.start_date.map(to_millis), Some(now_ms))
                }
                _ => (
                    current.start_date.map(to_millis),
                    current.end_date.map(to_millis),
                ),
            };
            tx.execute(
                "UPDATE experiments SET
                   is_active = COALESCE(?2, is_active),
                   description = COALESCE(?3, description),
                   traffic_split = COALESCE(?4, traffic_split),
                   target_pages = COALESCE(?5, target_pages),
                   component = COALESCE(?6, component),
                   control_version = COALESCE(?7, control_version),
                   variant_version = COALESCE(?8, variant_version),
                   primary_goal = COALESCE(?9, primary_goal),
                   success_metric = COALESCE(?10, success_metric),
                   start_date = ?11,
                   end_date = ?12,
                   updated_at = ?13
                 WHERE id = ?1",
                params![
                    id.as_str(),
                    patch.is_active,
                    patch.description,
                    patch.traffic_split.map(|s| i64::from(s.percent())),
                    target_pages,
                    patch.component,
                    control_version,
                    variant_version,
                    patch.primary_goal,
                    patch.success_metric,
                    start_date,
                    end_date,
                    now_ms,
                ],
            )?;
            let updated = fetch_experiment(&tx, id.as_str())?;
            tx.commit()?;
            Ok(updated)
        })
    }

    /// Deletes an experiment and, through the foreign key, its assignments.
    pub fn delete_experiment(&self, id: &ExperimentId) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM experiments WHERE id = ?1", params![id.as_str()])?;
            Ok(n > 0)
        })
    }

    /// Upserts the session's assignment and counts the view in one transaction.
    pub fn assign(
        &self,
        session_id: &SessionId,
        name: &ExperimentName,
        variant: &VariantLabel,
        counting: ViewCounting,
        now: DateTime<Utc>,
    ) -> Result<AssignOutcome, StoreError> {
        self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let Some(experiment_id) = active_experiment_id(&tx, name)? else {
                return Ok(AssignOutcome::Unavailable);
            };
            let now_ms = to_millis(now);
            let existed = tx
                .query_row(
                    "SELECT 1 FROM assignments WHERE experiment_id = ?1 AND session_id = ?2",
                    params![experiment_id, session_id.as_str()],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            tx.execute(
                "INSERT INTO assignments (id, experiment_id, session_id, variant, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                 ON CONFLICT(experiment_id, session_id)
                 DO UPDATE SET variant = excluded.variant, updated_at = excluded.updated_at",
                params![
                    uuid::Uuid::new_v4().to_string(),
                    experiment_id,
                    session_id.as_str(),
                    variant.as_str(),
                    now_ms,
                ],
            )?;
            let arm = variant.arm();
            let view_counted = match counting {
                ViewCounting::EveryAssignment => true,
                ViewCounting::FirstAssignment => !existed,
            };
            if view_counted {
                let column = views_column(arm);
                tx.execute(
                    &format!(
                        "UPDATE experiments SET {column} = {column} + 1, updated_at = ?2 WHERE id = ?1"
                    ),
                    params![experiment_id, now_ms],
                )?;
            }
            tx.commit()?;
            Ok(AssignOutcome::Assigned(AssignReceipt {
                experiment_id: ExperimentId::parse(&experiment_id).map_err(|e| {
                    StoreError::Sqlite(rusqlite::Error::FromSqlConversionFailure(
                        0,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    ))
                })?,
                arm,
                reassigned: existed,
                view_counted,
            }))
        })
    }

    /// Marks the session's unconverted assignments as converted and bumps the
    /// arm's conversion counter, unless the session's assignment already
    /// converted. Returns the experiment as re-read afterwards.
    pub fn convert(
        &self,
        session_id: &SessionId,
        name: &ExperimentName,
        variant: &VariantLabel,
        now: DateTime<Utc>,
    ) -> Result<ConvertOutcome, StoreError> {
        self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let Some(experiment_id) = active_experiment_id(&tx, name)? else {
                return Ok(ConvertOutcome::Unavailable);
            };
            let now_ms = to_millis(now);
            let assigned_rows: i64 = tx.query_row(
                "SELECT COUNT(*) FROM assignments WHERE experiment_id = ?1 AND session_id = ?2",
                params![experiment_id, session_id.as_str()],
                |row| row.get(0),
            )?;
            let converted_rows = tx.execute(
                "UPDATE assignments SET has_converted = 1, converted_at = ?3, updated_at = ?3
                 WHERE experiment_id = ?1 AND session_id = ?2 AND has_converted = 0",
                params![experiment_id, session_id.as_str(), now_ms],
            )?;
            let counted = assigned_rows == 0 || converted_rows > 0;
            if counted {
                let column = conversions_column(variant.arm());
                tx.execute(
                    &format!(
                        "UPDATE experiments SET {column} = {column} + 1, updated_at = ?2 WHERE id = ?1"
                    ),
                    params![experiment_id, now_ms],
                )?;
            }
            let experiment = fetch_experiment(&tx, &experiment_id)?
                .ok_or(StoreError::Sqlite(rusqlite::Error::QueryReturnedNoRows))?;
            tx.commit()?;
            Ok(ConvertOutcome::Converted {
                experiment,
                converted_rows,
                counted,
            })
        })
    }

    pub fn record_significance(
        &self,
        id: &ExperimentId,
        significance: &Significance,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE experiments SET p_value = ?2, confidence_level = ?3, is_significant = ?4,
                   winner = ?5, updated_at = ?6
                 WHERE id = ?1",
                params![
                    id.as_str(),
                    significance.p_value,
                    significance.confidence_level,
                    significance.is_significant,
                    significance.winner.map(Arm::as_str),
                    to_millis(now),
                ],
            )?;
            Ok(())
        })
    }

    pub fn assignments_for_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<Assignment>, StoreError> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE session_id = ?1 ORDER BY created_at ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![session_id.as_str()], assignment_from_row)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }

    pub fn assignment_count(&self, id: &ExperimentId) -> Result<u64, StoreError> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM assignments WHERE experiment_id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )?;
            Ok(u64::try_from(n).unwrap_or(0))
        })
    }
}
