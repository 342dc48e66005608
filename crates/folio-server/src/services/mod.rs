// SPDX-License-Identifier: Apache-2.0

//! Domain operations behind the HTTP handlers. Store access is synchronous
//! and always runs on the blocking pool.

pub(crate) mod experiments;
pub(crate) mod ingestion;
pub(crate) mod reports;

use folio_store::{SqliteStore, StoreError};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("blocking store task failed: {0}")]
    Worker(String),
}

impl ServiceError {
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Store(e) => e.is_transient(),
            Self::Worker(_) => false,
        }
    }
}

pub(crate) async fn with_store<T, F>(store: &Arc<SqliteStore>, op: F) -> Result<T, ServiceError>
where
    F: FnOnce(&SqliteStore) -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || op(&store))
        .await
        .map_err(|e| ServiceError::Worker(e.to_string()))?
        .map_err(ServiceError::from)
}
