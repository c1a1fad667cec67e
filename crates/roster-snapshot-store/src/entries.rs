//! Per-epoch fetch tracking and retry bookkeeping.

use rusqlite::{Connection, params};
use roster_snapshot::{AttemptOutcome, DownloadEntry, DownloadId, Endpoint, EntryStatus, EpochState};

use crate::epochs::{require_writable, state_of};
use crate::error::StoreError;
use crate::store::{SnapshotStore, now_timestamp};

const ENTRY_COLUMNS: &str = "id, download_id, endpoint, version, user_id, status, fetched_date, \
                             error_message, retry_count, required";

impl SnapshotStore {
    /// Register endpoints as pending. Endpoints already tracked for this
    /// epoch are left as they are. Returns how many were new.
    pub fn register_endpoints(
        &self,
        id: DownloadId,
        endpoints: &[Endpoint],
    ) -> Result<usize, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        require_writable(&tx, id)?;

        let fetched_date = now_timestamp();
        let mut added = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO download_entries
                    (download_id, endpoint, version, user_id, status, fetched_date, retry_count, required)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)
                 ON CONFLICT (download_id, endpoint, version) DO NOTHING",
            )?;
            for endpoint in endpoints {
                added += stmt.execute(params![
                    id.get(),
                    endpoint.name,
                    endpoint.version,
                    endpoint.user_id,
                    EntryStatus::Pending.as_str(),
                    fetched_date,
                    endpoint.required,
                ])?;
            }
        }
        tx.commit()?;

        tracing::debug!(download_id = %id, added, "Registered endpoints");
        Ok(added)
    }

    /// Record one fetch attempt. Failures bump the retry count; a success
    /// clears the last error but keeps the count. Failures against an
    /// exhausted entry leave it untouched; only
    /// [`rearm_exhausted`](Self::rearm_exhausted) brings it back.
    pub fn record_attempt(
        &self,
        id: DownloadId,
        endpoint: &Endpoint,
        outcome: &AttemptOutcome,
    ) -> Result<DownloadEntry, StoreError> {
        let conn = self.conn()?;
        require_writable(&conn, id)?;
        let fetched_date = now_timestamp();

        match outcome {
            AttemptOutcome::Succeeded => {
                conn.execute(
                    "INSERT INTO download_entries
                        (download_id, endpoint, version, user_id, status, fetched_date, error_message, retry_count, required)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, 0, ?7)
                     ON CONFLICT (download_id, endpoint, version) DO UPDATE SET
                        status = excluded.status,
                        fetched_date = excluded.fetched_date,
                        error_message = NULL",
                    params![
                        id.get(),
                        endpoint.name,
                        endpoint.version,
                        endpoint.user_id,
                        EntryStatus::Succeeded.as_str(),
                        fetched_date,
                        endpoint.required,
                    ],
                )?;
            }
            AttemptOutcome::Failed(cause) => {
                conn.execute(
                    "INSERT INTO download_entries
                        (download_id, endpoint, version, user_id, status, fetched_date, error_message, retry_count, required)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8)
                     ON CONFLICT (download_id, endpoint, version) DO UPDATE SET
                        status = excluded.status,
                        fetched_date = excluded.fetched_date,
                        error_message = excluded.error_message,
                        retry_count = download_entries.retry_count + 1
                     WHERE download_entries.status != ?9",
                    params![
                        id.get(),
                        endpoint.name,
                        endpoint.version,
                        endpoint.user_id,
                        EntryStatus::Failed.as_str(),
                        fetched_date,
                        cause,
                        endpoint.required,
                        EntryStatus::Exhausted.as_str(),
                    ],
                )?;
            }
        }

        let entry = conn.query_row(
            &format!(
                "SELECT {ENTRY_COLUMNS} FROM download_entries
                 WHERE download_id = ?1 AND endpoint = ?2 AND version = ?3"
            ),
            params![id.get(), endpoint.name, endpoint.version],
            row_to_entry,
        )?;

        match &entry.status {
            EntryStatus::Failed => tracing::warn!(
                download_id = %id,
                endpoint = %endpoint,
                retry_count = entry.retry_count,
                error = entry.error_message.as_deref().unwrap_or_default(),
                "Fetch attempt failed"
            ),
            EntryStatus::Exhausted => tracing::debug!(
                download_id = %id,
                endpoint = %endpoint,
                "Endpoint already exhausted; attempt not counted"
            ),
            _ => tracing::debug!(download_id = %id, endpoint = %endpoint, "Fetch attempt succeeded"),
        }
        Ok(entry)
    }

    /// Failed endpoints still under `max_retries`. Failed entries at or over
    /// the ceiling are marked exhausted first and never returned again.
    pub fn next_retryable(
        &self,
        id: DownloadId,
        max_retries: u32,
    ) -> Result<Vec<Endpoint>, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        require_writable(&tx, id)?;

        let exhausted = tx.execute(
            "UPDATE download_entries SET status = ?1
             WHERE download_id = ?2 AND status = ?3 AND retry_count >= ?4",
            params![
                EntryStatus::Exhausted.as_str(),
                id.get(),
                EntryStatus::Failed.as_str(),
                max_retries,
            ],
        )?;
        if exhausted > 0 {
            tracing::warn!(download_id = %id, exhausted, max_retries, "Endpoints exhausted their retries");
        }

        let endpoints = entries_with_status(&tx, id, EntryStatus::Failed)?
            .into_iter()
            .map(|e| e.endpoint())
            .collect();
        tx.commit()?;
        Ok(endpoints)
    }

    /// Registered endpoints never attempted.
    pub fn pending_endpoints(&self, id: DownloadId) -> Result<Vec<Endpoint>, StoreError> {
        let conn = self.conn()?;
        Ok(entries_with_status(&conn, id, EntryStatus::Pending)?
            .into_iter()
            .map(|e| e.endpoint())
            .collect())
    }

    /// Give exhausted endpoints a fresh retry budget. Returns how many were
    /// re-armed.
    pub fn rearm_exhausted(&self, id: DownloadId) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        require_writable(&conn, id)?;
        let rearmed = conn.execute(
            "UPDATE download_entries SET status = ?1, retry_count = 0
             WHERE download_id = ?2 AND status = ?3",
            params![
                EntryStatus::Failed.as_str(),
                id.get(),
                EntryStatus::Exhausted.as_str(),
            ],
        )?;
        if rearmed > 0 {
            tracing::info!(download_id = %id, rearmed, "Re-armed exhausted endpoints");
        }
        Ok(rearmed)
    }

    /// Every tracked entry for an epoch, exhausted ones included.
    pub fn list_entries(&self, id: DownloadId) -> Result<Vec<DownloadEntry>, StoreError> {
        let conn = self.conn()?;
        if state_of(&conn, id)?.is_none() {
            return Err(StoreError::NotFound(id));
        }
        all_entries(&conn, id)
    }

    /// Completeness of an epoch judged from its entries alone.
    pub fn completeness(&self, id: DownloadId) -> Result<EpochState, StoreError> {
        Ok(completeness_of(&self.list_entries(id)?))
    }
}

/// `Open` while anything is pending, failed or unregistered; `Complete` when
/// every required entry succeeded; `Partial` otherwise.
pub fn completeness_of(entries: &[DownloadEntry]) -> EpochState {
    if entries.is_empty()
        || entries
            .iter()
            .any(|e| matches!(e.status, EntryStatus::Pending | EntryStatus::Failed))
    {
        return EpochState::Open;
    }

    let required_done = entries
        .iter()
        .filter(|e| e.required)
        .all(|e| e.status == EntryStatus::Succeeded);

    if required_done {
        EpochState::Complete
    } else {
        EpochState::Partial
    }
}

pub(crate) fn all_entries(
    conn: &Connection,
    id: DownloadId,
) -> Result<Vec<DownloadEntry>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ENTRY_COLUMNS} FROM download_entries WHERE download_id = ?1 ORDER BY id"
    ))?;
    let entries = stmt
        .query_map([id.get()], row_to_entry)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

fn entries_with_status(
    conn: &Connection,
    id: DownloadId,
    status: EntryStatus,
) -> Result<Vec<DownloadEntry>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ENTRY_COLUMNS} FROM download_entries
         WHERE download_id = ?1 AND status = ?2 ORDER BY id"
    ))?;
    let entries = stmt
        .query_map(params![id.get(), status.as_str()], row_to_entry)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<DownloadEntry> {
    let status: String = row.get(5)?;
    Ok(DownloadEntry {
        id: row.get(0)?,
        download_id: DownloadId::new(row.get(1)?),
        endpoint: row.get(2)?,
        version: row.get(3)?,
        user_id: row.get(4)?,
        status: EntryStatus::parse(&status).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                5,
                rusqlite::types::Type::Text,
                format!("unknown entry status '{status}'").into(),
            )
        })?,
        fetched_date: row.get(6)?,
        error_message: row.get(7)?,
        retry_count: row.get(8)?,
        required: row.get(9)?,
    })
}
