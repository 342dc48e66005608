#![forbid(unsafe_code)]
//! SQLite persistence for folio.
//!
//! One connection is shared behind a mutex; callers on an async runtime are
//! expected to run store calls on a blocking thread.

mod codec;
mod error;
mod experiments;
mod reports;
mod schema;
mod sessions;

pub use error::StoreError;
pub use experiments::{AssignOutcome, AssignReceipt, ConvertOutcome, ViewCounting};
pub use reports::{
    AverageVitals, DashboardReport, DeviceShare, ExperimentSummary, Overview, PageStat, Trends,
    TOP_PAGES_LIMIT,
};
pub use schema::{SCHEMA_VERSION, BUSY_TIMEOUT};

use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;

pub const CRATE_NAME: &str = "folio-store";

#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::init(conn, true)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, false)
    }

    fn init(mut conn: Connection, on_disk: bool) -> Result<Self, StoreError> {
        schema::apply_pragmas(&conn, on_disk)?;
        schema::run_migrations(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub(crate) fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut guard = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        f(&mut guard)
    }

    /// Cheap liveness probe used by readiness checks.
    pub fn ping(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
    }

    pub fn schema_version(&self) -> Result<u32, StoreError> {
        self.with_conn(|conn| schema::current_version(conn))
    }
}
