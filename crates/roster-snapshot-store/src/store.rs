use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{SecondsFormat, Utc};
use roster_snapshot::DownloadId;

use crate::error::StoreError;
use crate::schema;

pub(crate) type ClaimSet = Arc<Mutex<HashSet<DownloadId>>>;

/// A SQLite-backed store of download epochs and the snapshots written
/// under them.
pub struct SnapshotStore {
    conn: Mutex<rusqlite::Connection>,
    claims: ClaimSet,
}

impl SnapshotStore {
    /// Open a store backed by a file on disk, migrating it to the latest
    /// schema.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = rusqlite::Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::with_connection(conn)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(rusqlite::Connection::open_in_memory()?)
    }

    fn with_connection(conn: rusqlite::Connection) -> Result<Self, StoreError> {
        schema::configure(&conn)?;
        let mut store = Self {
            conn: Mutex::new(conn),
            claims: Arc::new(Mutex::new(HashSet::new())),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&mut self) -> Result<(), StoreError> {
        let conn = self
            .conn
            .get_mut()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        schema::migrations().to_latest(conn)?;
        Ok(())
    }

    pub fn schema_version(&self) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        schema::current_version(&conn)
    }

    pub(crate) fn conn(&self) -> Result<MutexGuard<'_, rusqlite::Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Database(format!("connection lock poisoned: {e}")))
    }

    pub(crate) fn claims(&self) -> Result<MutexGuard<'_, HashSet<DownloadId>>, StoreError> {
        self.claims
            .lock()
            .map_err(|e| StoreError::Database(format!("claim registry poisoned: {e}")))
    }

    pub(crate) fn claim_set(&self) -> ClaimSet {
        Arc::clone(&self.claims)
    }
}

pub(crate) fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
