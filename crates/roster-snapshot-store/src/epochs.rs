//! Download epoch lifecycle: open, claim, discard, retire.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use roster_snapshot::{Download, DownloadId, EpochState};

use crate::error::StoreError;
use crate::store::{ClaimSet, SnapshotStore, now_timestamp};

/// Exclusive right to write under one epoch, held by a single writer.
///
/// Released on drop.
pub struct EpochClaim {
    id: DownloadId,
    claims: ClaimSet,
}

impl EpochClaim {
    pub fn download_id(&self) -> DownloadId {
        self.id
    }
}

impl fmt::Debug for EpochClaim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EpochClaim").field("id", &self.id).finish()
    }
}

impl Drop for EpochClaim {
    fn drop(&mut self) {
        if let Ok(mut claims) = self.claims.lock() {
            claims.remove(&self.id);
        }
    }
}

impl SnapshotStore {
    /// Open a new epoch. Ids are never reused, even after deletion.
    pub fn begin_epoch(&self) -> Result<DownloadId, StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO downloads (timestamp, status) VALUES (?1, ?2)",
            params![now_timestamp(), EpochState::Open.as_str()],
        )?;
        let id = DownloadId::new(conn.last_insert_rowid());
        tracing::info!(download_id = %id, "Opened download epoch");
        Ok(id)
    }

    pub fn epoch_state(&self, id: DownloadId) -> Result<EpochState, StoreError> {
        let conn = self.conn()?;
        state_of(&conn, id)?.ok_or(StoreError::NotFound(id))
    }

    pub fn download(&self, id: DownloadId) -> Result<Download, StoreError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, timestamp, status FROM downloads WHERE id = ?1",
            [id.get()],
            row_to_download,
        )
        .optional()?
        .ok_or(StoreError::NotFound(id))
    }

    /// Every known epoch id, ascending.
    pub fn list_epochs(&self) -> Result<Vec<DownloadId>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id FROM downloads ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .map(|r| r.map(DownloadId::new))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    pub fn list_downloads(&self) -> Result<Vec<Download>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, timestamp, status FROM downloads ORDER BY id")?;
        let downloads = stmt
            .query_map([], row_to_download)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(downloads)
    }

    /// Take the single-writer claim on an epoch that still accepts writes.
    pub fn claim_epoch(&self, id: DownloadId) -> Result<EpochClaim, StoreError> {
        let mut claims = self.claims()?;
        {
            let conn = self.conn()?;
            let state = state_of(&conn, id)?.ok_or(StoreError::NotFound(id))?;
            if !state.accepts_writes() {
                return Err(StoreError::Concurrency(format!(
                    "download {id} is {state} and accepts no writes"
                )));
            }
        }
        if !claims.insert(id) {
            return Err(StoreError::Concurrency(format!(
                "download {id} is already being written"
            )));
        }
        tracing::debug!(download_id = %id, "Claimed epoch");
        Ok(EpochClaim {
            id,
            claims: self.claim_set(),
        })
    }

    pub fn is_claimed(&self, id: DownloadId) -> Result<bool, StoreError> {
        Ok(self.claims()?.contains(&id))
    }

    /// Give up on an unpromoted epoch. Its rows stay until retention or an
    /// explicit [`retire_epoch`](Self::retire_epoch) deletes them.
    pub fn discard_epoch(&self, id: DownloadId) -> Result<(), StoreError> {
        let claims = self.claims()?;
        if claims.contains(&id) {
            return Err(StoreError::Concurrency(format!(
                "download {id} is being written"
            )));
        }

        let conn = self.conn()?;
        match state_of(&conn, id)? {
            None => Err(StoreError::NotFound(id)),
            Some(EpochState::Retired) => Ok(()),
            Some(EpochState::Promoted) => Err(StoreError::Concurrency(format!(
                "download {id} is current; promote another epoch first"
            ))),
            Some(_) => {
                set_state(&conn, id, EpochState::Retired)?;
                tracing::info!(download_id = %id, "Discarded epoch");
                Ok(())
            }
        }
    }

    /// Delete a retired epoch and, by cascade, every row written under it.
    pub fn retire_epoch(&self, id: DownloadId) -> Result<(), StoreError> {
        let claims = self.claims()?;
        if claims.contains(&id) {
            return Err(StoreError::Concurrency(format!(
                "download {id} is being written"
            )));
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        match state_of(&tx, id)? {
            None => return Err(StoreError::NotFound(id)),
            Some(EpochState::Retired) => {}
            Some(state) => {
                return Err(StoreError::Concurrency(format!(
                    "download {id} is {state}; only retired epochs can be deleted"
                )));
            }
        }
        tx.execute("DELETE FROM downloads WHERE id = ?1", [id.get()])?;
        tx.commit()?;

        tracing::info!(download_id = %id, "Deleted retired epoch");
        Ok(())
    }

    /// Open epochs started more than `older_than` ago, oldest first.
    pub fn abandoned_epochs(&self, older_than: Duration) -> Result<Vec<Download>, StoreError> {
        let cutoff = Utc::now() - older_than;
        let open: Vec<Download> = self
            .list_downloads()?
            .into_iter()
            .filter(|d| d.state == EpochState::Open)
            .collect();

        let mut abandoned = Vec::new();
        for download in open {
            match DateTime::parse_from_rfc3339(&download.timestamp) {
                Ok(started) if started.with_timezone(&Utc) < cutoff => abandoned.push(download),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(
                        download_id = %download.id,
                        timestamp = %download.timestamp,
                        error = %e,
                        "Skipping epoch with unreadable timestamp"
                    );
                }
            }
        }
        Ok(abandoned)
    }
}

pub(crate) fn state_of(conn: &Connection, id: DownloadId) -> Result<Option<EpochState>, StoreError> {
    let status: Option<String> = conn
        .query_row(
            "SELECT status FROM downloads WHERE id = ?1",
            [id.get()],
            |row| row.get(0),
        )
        .optional()?;
    status
        .map(|s| {
            EpochState::parse(&s)
                .ok_or_else(|| StoreError::Database(format!("unknown epoch status '{s}'")))
        })
        .transpose()
}

/// Writes land only under an existing epoch that is neither current nor
/// retired.
pub(crate) fn require_writable(conn: &Connection, id: DownloadId) -> Result<(), StoreError> {
    match state_of(conn, id)? {
        None => Err(StoreError::Integrity(format!("download {id} does not exist"))),
        Some(state) if !state.accepts_writes() => Err(StoreError::Concurrency(format!(
            "download {id} is {state} and accepts no writes"
        ))),
        Some(_) => Ok(()),
    }
}

pub(crate) fn set_state(
    conn: &Connection,
    id: DownloadId,
    state: EpochState,
) -> Result<(), StoreError> {
    let changed = conn.execute(
        "UPDATE downloads SET status = ?1 WHERE id = ?2",
        params![state.as_str(), id.get()],
    )?;
    if changed == 0 {
        return Err(StoreError::NotFound(id));
    }
    Ok(())
}

fn row_to_download(row: &rusqlite::Row<'_>) -> rusqlite::Result<Download> {
    let status: String = row.get(2)?;
    Ok(Download {
        id: DownloadId::new(row.get(0)?),
        timestamp: row.get(1)?,
        state: EpochState::parse(&status).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                format!("unknown epoch status '{status}'").into(),
            )
        })?,
    })
}
