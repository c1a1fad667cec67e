use rusqlite::{Connection, OptionalExtension, params};
use roster_snapshot::{DownloadId, EpochState, PromotionPolicy};

use crate::entries::{all_entries, completeness_of};
use crate::epochs::{set_state, state_of};
use crate::error::StoreError;
use crate::store::{SnapshotStore, now_timestamp};

/// What a promotion changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotionReport {
    pub promoted: DownloadId,
    /// The epoch that was current before, now retired.
    pub superseded: Option<DownloadId>,
    /// Retired epochs deleted by retention afterwards.
    pub purged: Vec<DownloadId>,
}

impl SnapshotStore {
    /// Recompute an unsealed epoch's state from its entries and persist it.
    /// Promoted and retired epochs are returned unchanged.
    pub fn evaluate_epoch(&self, id: DownloadId) -> Result<EpochState, StoreError> {
        let conn = self.conn()?;
        let state = evaluate(&conn, id)?;
        tracing::debug!(download_id = %id, state = %state, "Evaluated epoch");
        Ok(state)
    }

    /// The epoch readers should use, if any has been promoted.
    pub fn current_epoch(&self) -> Result<Option<DownloadId>, StoreError> {
        let conn = self.conn()?;
        current_of(&conn)
    }

    /// Make `id` the current epoch. The previous current epoch is retired in
    /// the same transaction, then retention runs.
    ///
    /// Once the transaction commits the promotion stands; a retention failure
    /// is logged and leaves `purged` empty.
    pub fn promote(
        &self,
        id: DownloadId,
        policy: &PromotionPolicy,
    ) -> Result<PromotionReport, StoreError> {
        let superseded = {
            let claims = self.claims()?;
            if claims.contains(&id) {
                return Err(StoreError::Concurrency(format!(
                    "download {id} is still being written"
                )));
            }

            let mut conn = self.conn()?;
            let tx = conn.transaction()?;
            let state = evaluate(&tx, id)?;
            let promotable = match state {
                EpochState::Complete => true,
                EpochState::Partial => policy.allow_partial,
                _ => false,
            };
            if !promotable {
                return Err(StoreError::NotPromotable { id, state });
            }

            let previous = current_of(&tx)?;
            if let Some(previous) = previous {
                set_state(&tx, previous, EpochState::Retired)?;
            }
            tx.execute(
                "INSERT INTO current_download (slot, download_id, promoted_at) VALUES (1, ?1, ?2)
                 ON CONFLICT (slot) DO UPDATE SET
                    download_id = excluded.download_id,
                    promoted_at = excluded.promoted_at",
                params![id.get(), now_timestamp()],
            )?;
            tx.execute(
                "INSERT INTO promotions (download_id, promoted_at) VALUES (?1, ?2)",
                params![id.get(), now_timestamp()],
            )?;
            set_state(&tx, id, EpochState::Promoted)?;
            tx.commit()?;
            previous
        };

        tracing::info!(
            download_id = %id,
            superseded = ?superseded.map(|s| s.get()),
            "Promoted epoch"
        );

        let purged = match self.apply_retention(policy.keep_previous) {
            Ok(purged) => purged,
            Err(e) => {
                tracing::warn!(download_id = %id, error = %e, "Retention failed after promotion");
                Vec::new()
            }
        };
        Ok(PromotionReport {
            promoted: id,
            superseded,
            purged,
        })
    }

    /// Delete retired epochs that were never current, then superseded epochs
    /// beyond the `keep_previous` most recently promoted. Returns the deleted
    /// ids.
    pub fn apply_retention(&self, keep_previous: usize) -> Result<Vec<DownloadId>, StoreError> {
        let retired = {
            let conn = self.conn()?;
            retired_epochs(&conn)?
        };

        let (superseded, discarded): (Vec<_>, Vec<_>) =
            retired.into_iter().partition(|(_, was_current)| *was_current);
        let doomed = discarded
            .into_iter()
            .chain(superseded.into_iter().skip(keep_previous))
            .map(|(id, _)| id);

        let mut purged = Vec::new();
        for id in doomed {
            match self.retire_epoch(id) {
                Ok(()) => purged.push(id),
                Err(StoreError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        if !purged.is_empty() {
            tracing::info!(count = purged.len(), keep_previous, "Applied retention");
        }
        Ok(purged)
    }
}

/// Retired epochs, most recently promoted first, flagged by whether they
/// were ever current.
fn retired_epochs(conn: &Connection) -> Result<Vec<(DownloadId, bool)>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT d.id, p.download_id IS NOT NULL FROM downloads d
         LEFT JOIN promotions p ON p.download_id = d.id
         WHERE d.status = ?1
         ORDER BY p.promoted_at DESC, d.id DESC",
    )?;
    let rows = stmt
        .query_map([EpochState::Retired.as_str()], |row| {
            Ok((DownloadId::new(row.get(0)?), row.get(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn evaluate(conn: &Connection, id: DownloadId) -> Result<EpochState, StoreError> {
    let stored = state_of(conn, id)?.ok_or(StoreError::NotFound(id))?;
    if !stored.accepts_writes() {
        return Ok(stored);
    }
    let computed = completeness_of(&all_entries(conn, id)?);
    if computed != stored {
        set_state(conn, id, computed)?;
    }
    Ok(computed)
}

fn current_of(conn: &Connection) -> Result<Option<DownloadId>, StoreError> {
    let id: Option<i64> = conn
        .query_row(
            "SELECT download_id FROM current_download WHERE slot = 1",
            [],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id.map(DownloadId::new))
}
