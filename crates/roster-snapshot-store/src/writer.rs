//! Writes snapshot rows under an epoch, plus the read helpers that join
//! them back together.

use rusqlite::{OptionalExtension, Transaction, params, params_from_iter};
use rusqlite::types::Value;
use roster_snapshot::{
    Country, DownloadId, EntityKind, League, Player, ReferenceBatch, SingletonRow, Team,
};

use crate::epochs::require_writable;
use crate::error::StoreError;
use crate::records::{ReferenceRecord, SingletonRecord};
use crate::store::{SnapshotStore, now_timestamp};

/// Outcome of one reference batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    pub kind: EntityKind,
    pub inserted: usize,
    /// Rows already present with identical attributes, e.g. on retry.
    pub unchanged: usize,
}

/// Outcome of one attachment write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentWrite {
    Inserted,
    Unchanged,
}

impl SnapshotStore {
    /// Write one entity kind's rows under `id` as a single transaction.
    ///
    /// Rows are append-only: a row already stored for the same
    /// `(id, download_id)` is skipped when identical and rejects the whole
    /// batch when it differs.
    pub fn write_reference_batch(
        &self,
        id: DownloadId,
        batch: &ReferenceBatch,
    ) -> Result<BatchReport, StoreError> {
        let duplicates = batch.duplicate_ids();
        if !duplicates.is_empty() {
            return Err(StoreError::Validation(format!(
                "batch for {} under download {id} repeats ids {duplicates:?}",
                batch.kind()
            )));
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        require_writable(&tx, id)?;

        let report = match batch {
            ReferenceBatch::Cups(rows) => insert_reference_rows(&tx, id, rows)?,
            ReferenceBatch::Languages(rows) => insert_reference_rows(&tx, id, rows)?,
            ReferenceBatch::Currencies(rows) => insert_reference_rows(&tx, id, rows)?,
            ReferenceBatch::Countries(rows) => {
                let rows: Vec<Country> =
                    rows.iter().cloned().map(Country::with_derived_flag).collect();
                insert_reference_rows(&tx, id, &rows)?
            }
            ReferenceBatch::Regions(rows) => insert_reference_rows(&tx, id, rows)?,
            ReferenceBatch::Leagues(rows) => insert_reference_rows(&tx, id, rows)?,
            ReferenceBatch::Users(rows) => insert_reference_rows(&tx, id, rows)?,
        };
        tx.commit()?;

        tracing::debug!(
            download_id = %id,
            kind = %report.kind,
            inserted = report.inserted,
            unchanged = report.unchanged,
            "Wrote reference batch"
        );
        Ok(report)
    }

    /// Insert or overwrite a latest-only row. Last write wins.
    pub fn upsert_singleton(&self, row: &SingletonRow) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let updated_at = now_timestamp();
        match row {
            SingletonRow::Team(team) => upsert_singleton_row(&conn, team, &updated_at)?,
            SingletonRow::Player(player) => upsert_singleton_row(&conn, player, &updated_at)?,
        }
        tracing::debug!(kind = %row.kind(), id = row.natural_id(), "Upserted singleton");
        Ok(())
    }

    /// Fill a team's denormalized names from the reference rows of epoch
    /// `id`. Names not found in that epoch keep their incoming value.
    pub fn denormalize_team(&self, id: DownloadId, team: &mut Team) -> Result<(), StoreError> {
        let conn = self.conn()?;

        if let (None, Some(league_id)) = (team.country_id, team.league_id) {
            let country: Option<i64> = conn
                .query_row(
                    "SELECT c.id FROM leagues l
                     JOIN countries c ON c.id = l.country_id AND c.download_id = l.download_id
                     WHERE l.id = ?1 AND l.download_id = ?2",
                    params![league_id, id.get()],
                    |row| row.get(0),
                )
                .optional()?;
            team.country_id = country;
        }

        let lookup = |table: &str, natural_id: Option<i64>| -> Result<Option<String>, StoreError> {
            let Some(natural_id) = natural_id else {
                return Ok(None);
            };
            Ok(conn
                .query_row(
                    &format!("SELECT name FROM {table} WHERE id = ?1 AND download_id = ?2"),
                    params![natural_id, id.get()],
                    |row| row.get(0),
                )
                .optional()?)
        };

        if let Some(name) = lookup("leagues", team.league_id)? {
            team.league_name = Some(name);
        }
        if let Some(name) = lookup("countries", team.country_id)? {
            team.country_name = Some(name);
        }
        if let Some(name) = lookup("regions", team.region_id)? {
            team.region_name = Some(name);
        }
        if let Some(name) = lookup("cups", team.cup_id)? {
            team.cup_name = Some(name);
        }
        Ok(())
    }

    /// Store an avatar image for a player under an epoch. Rewriting the
    /// same bytes is a no-op; different bytes are a conflict.
    pub fn write_attachment(
        &self,
        player_id: i64,
        id: DownloadId,
        image: &[u8],
    ) -> Result<AttachmentWrite, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        require_writable(&tx, id)?;

        let inserted = tx.execute(
            "INSERT INTO avatars (player_id, download_id, image) VALUES (?1, ?2, ?3)
             ON CONFLICT (player_id, download_id) DO NOTHING",
            params![player_id, id.get(), image],
        )?;

        let write = if inserted == 1 {
            AttachmentWrite::Inserted
        } else {
            let existing: Vec<u8> = tx.query_row(
                "SELECT image FROM avatars WHERE player_id = ?1 AND download_id = ?2",
                params![player_id, id.get()],
                |row| row.get(0),
            )?;
            if existing != image {
                return Err(StoreError::Conflict(format!(
                    "avatar for player {player_id} under download {id} already stored with different content"
                )));
            }
            AttachmentWrite::Unchanged
        };
        tx.commit()?;
        Ok(write)
    }

    /// Natural ids of one entity kind written under an epoch, ascending.
    pub fn reference_ids(&self, kind: EntityKind, id: DownloadId) -> Result<Vec<i64>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT id FROM {} WHERE download_id = ?1 ORDER BY id",
            kind.table()
        ))?;
        let ids = stmt
            .query_map([id.get()], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    /// Every row of `T` written under an epoch, ordered by natural id.
    pub fn reference_rows<T: ReferenceRecord>(&self, id: DownloadId) -> Result<Vec<T>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT id, {} FROM {} WHERE download_id = ?1 ORDER BY id",
            T::COLUMNS.join(", "),
            T::KIND.table()
        ))?;
        let rows = stmt
            .query_map([id.get()], T::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// A league and its country, both as of the same epoch.
    pub fn league_with_country(
        &self,
        id: DownloadId,
        league_id: i64,
    ) -> Result<Option<(League, Option<Country>)>, StoreError> {
        let conn = self.conn()?;
        let league: Option<League> = conn
            .query_row(
                &format!(
                    "SELECT id, {} FROM leagues WHERE id = ?1 AND download_id = ?2",
                    League::COLUMNS.join(", ")
                ),
                params![league_id, id.get()],
                League::from_row,
            )
            .optional()?;
        let Some(league) = league else {
            return Ok(None);
        };

        let country: Option<Country> = conn
            .query_row(
                &format!(
                    "SELECT c.id, {} FROM leagues l
                     JOIN countries c ON c.id = l.country_id AND c.download_id = l.download_id
                     WHERE l.id = ?1 AND l.download_id = ?2",
                    prefixed("c", Country::COLUMNS)
                ),
                params![league_id, id.get()],
                Country::from_row,
            )
            .optional()?;
        Ok(Some((league, country)))
    }

    pub fn team(&self, team_id: i64) -> Result<Option<Team>, StoreError> {
        self.singleton(team_id)
    }

    pub fn player(&self, player_id: i64) -> Result<Option<Player>, StoreError> {
        self.singleton(player_id)
    }

    pub fn players_for_team(&self, team_id: i64) -> Result<Vec<Player>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT id, {} FROM players WHERE team_id = ?1 ORDER BY id",
            Player::COLUMNS.join(", ")
        ))?;
        let players = stmt
            .query_map([team_id], Player::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(players)
    }

    /// A player's avatars across all epochs, oldest epoch first.
    pub fn avatars_for_player(
        &self,
        player_id: i64,
    ) -> Result<Vec<(DownloadId, Vec<u8>)>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT download_id, image FROM avatars WHERE player_id = ?1 ORDER BY download_id",
        )?;
        let avatars = stmt
            .query_map([player_id], |row| {
                Ok((DownloadId::new(row.get(0)?), row.get(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(avatars)
    }

    /// Rows held under an epoch across every epoch-scoped table.
    pub fn epoch_row_count(&self, id: DownloadId) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        let mut tables: Vec<&str> = EntityKind::all().iter().map(|k| k.table()).collect();
        tables.extend(["avatars", "download_entries"]);

        let mut total = 0;
        for table in tables {
            let count: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM {table} WHERE download_id = ?1"),
                [id.get()],
                |row| row.get(0),
            )?;
            total += count as usize;
        }
        Ok(total)
    }

    fn singleton<T: SingletonRecord>(&self, natural_id: i64) -> Result<Option<T>, StoreError> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT id, {} FROM {} WHERE id = ?1",
                    T::COLUMNS.join(", "),
                    T::KIND.table()
                ),
                [natural_id],
                T::from_row,
            )
            .optional()?;
        Ok(row)
    }
}

fn insert_reference_rows<T: ReferenceRecord>(
    tx: &Transaction<'_>,
    id: DownloadId,
    rows: &[T],
) -> Result<BatchReport, StoreError> {
    let table = T::KIND.table();
    let columns = T::COLUMNS.join(", ");
    let placeholders = placeholders(T::COLUMNS.len() + 2);

    let mut insert = tx.prepare(&format!(
        "INSERT INTO {table} (id, download_id, {columns}) VALUES ({placeholders})
         ON CONFLICT (id, download_id) DO NOTHING"
    ))?;
    let mut existing = tx.prepare(&format!(
        "SELECT id, {columns} FROM {table} WHERE id = ?1 AND download_id = ?2"
    ))?;

    let mut report = BatchReport {
        kind: T::KIND,
        inserted: 0,
        unchanged: 0,
    };
    for row in rows {
        let mut values = vec![Value::Integer(row.id()), Value::Integer(id.get())];
        values.extend(row.values());

        if insert.execute(params_from_iter(values))? == 1 {
            report.inserted += 1;
            continue;
        }

        let stored = existing.query_row(params![row.id(), id.get()], T::from_row)?;
        if &stored != row {
            return Err(StoreError::Validation(format!(
                "{table} id {} already written under download {id} with different attributes",
                row.id()
            )));
        }
        report.unchanged += 1;
    }
    Ok(report)
}

fn upsert_singleton_row<T: SingletonRecord>(
    conn: &rusqlite::Connection,
    row: &T,
    updated_at: &str,
) -> Result<(), StoreError> {
    let table = T::KIND.table();
    let columns = T::COLUMNS.join(", ");
    let updates = T::COLUMNS
        .iter()
        .chain(std::iter::once(&"updated_at"))
        .map(|c| format!("{c} = excluded.{c}"))
        .collect::<Vec<_>>()
        .join(", ");

    let mut values = vec![Value::Integer(row.id())];
    values.extend(row.values());
    values.push(Value::Text(updated_at.to_string()));

    conn.execute(
        &format!(
            "INSERT INTO {table} (id, {columns}, updated_at) VALUES ({})
             ON CONFLICT (id) DO UPDATE SET {updates}",
            placeholders(values.len())
        ),
        params_from_iter(values),
    )?;
    Ok(())
}

fn placeholders(count: usize) -> String {
    (1..=count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn prefixed(alias: &str, columns: &[&str]) -> String {
    columns
        .iter()
        .map(|c| format!("{alias}.{c}"))
        .collect::<Vec<_>>()
        .join(", ")
}
