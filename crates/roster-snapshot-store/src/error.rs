use roster_snapshot::{DownloadId, EpochState};

/// Errors specific to store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A row was rejected before it reached storage (duplicate natural id,
    /// malformed row). Aborts only the batch being written.
    #[error("validation error: {0}")]
    Validation(String),

    /// An immutable row already exists with different content.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A referential constraint failed, e.g. writing under a missing epoch.
    #[error("integrity error: {0}")]
    Integrity(String),

    /// The epoch is sealed, or another writer holds it.
    #[error("concurrency error: {0}")]
    Concurrency(String),

    #[error("download {id} is {state} and cannot be promoted")]
    NotPromotable { id: DownloadId, state: EpochState },

    #[error("download {0} not found")]
    NotFound(DownloadId),

    #[error("database error: {0}")]
    Database(String),

    #[error("migration error: {0}")]
    Migration(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(failure, _)
                if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY =>
            {
                Self::Integrity(e.to_string())
            }
            _ => Self::Database(e.to_string()),
        }
    }
}

impl From<rusqlite_migration::Error> for StoreError {
    fn from(e: rusqlite_migration::Error) -> Self {
        Self::Migration(e.to_string())
    }
}
