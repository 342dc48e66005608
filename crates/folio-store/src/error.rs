// SPDX-License-Identifier: Apache-2.0

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("migration failed at version {version}: {message}")]
    MigrationFailed { version: u32, message: String },

    #[error("experiment name already exists: {name}")]
    DuplicateName { name: String },

    #[error("json column encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("store connection lock poisoned")]
    Poisoned,
}

impl StoreError {
    /// True for SQLite busy/locked conditions that may clear on their own.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Sqlite(rusqlite::Error::SqliteFailure(e, _))
                if matches!(
                    e.code,
                    rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                )
        )
    }
}
