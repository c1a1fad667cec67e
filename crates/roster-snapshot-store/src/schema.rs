//! Ordered, paired up/down migrations.
//!
//! Every step ships with a down script that restores the previous shape
//! exactly, including narrowing composite keys back to natural ids.

use std::path::Path;

use rusqlite::Connection;
use rusqlite_migration::{Migrations, SchemaVersion, M};

use crate::error::StoreError;

/// Number of migrations; the schema version of a fully migrated database.
pub const SCHEMA_VERSION: usize = 6;

pub fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        M::up(include_str!("../migrations/01_base/up.sql"))
            .down(include_str!("../migrations/01_base/down.sql")),
        M::up(include_str!("../migrations/02_download_entries/up.sql"))
            .down(include_str!("../migrations/02_download_entries/down.sql")),
        M::up(include_str!("../migrations/03_epoch_scoped_reference/up.sql"))
            .down(include_str!("../migrations/03_epoch_scoped_reference/down.sql")),
        M::up(include_str!("../migrations/04_avatars/up.sql"))
            .down(include_str!("../migrations/04_avatars/down.sql")),
        M::up(include_str!("../migrations/05_current_download/up.sql"))
            .down(include_str!("../migrations/05_current_download/down.sql")),
        M::up(include_str!("../migrations/06_promotions/up.sql"))
            .down(include_str!("../migrations/06_promotions/down.sql")),
    ])
}

/// Cascading deletes depend on this; SQLite leaves it off per connection.
pub(crate) fn configure(conn: &Connection) -> Result<(), StoreError> {
    conn.pragma_update(None, "foreign_keys", true)?;
    Ok(())
}

/// Current migration version of an open connection (0 when unmigrated).
pub fn current_version(conn: &Connection) -> Result<usize, StoreError> {
    let version = migrations().current_version(conn)?;
    Ok(match version {
        SchemaVersion::NoneSet => 0,
        SchemaVersion::Inside(v) | SchemaVersion::Outside(v) => v.get(),
    })
}

/// Move a database file to `target` (latest when `None`), up or down.
///
/// Returns the version before and after.
pub fn migrate_file(path: &Path, target: Option<usize>) -> Result<(usize, usize), StoreError> {
    let mut conn = Connection::open(path)?;
    configure(&conn)?;

    let before = current_version(&conn)?;
    let target = target.unwrap_or(SCHEMA_VERSION);
    if target > SCHEMA_VERSION {
        return Err(StoreError::Migration(format!(
            "version {target} is newer than supported version {SCHEMA_VERSION}"
        )));
    }

    migrations().to_version(&mut conn, target)?;
    let after = current_version(&conn)?;

    if before != after {
        tracing::info!(from = before, to = after, "Migrated snapshot schema");
    }
    Ok((before, after))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_valid() {
        migrations().validate().unwrap();
    }

    #[test]
    fn fresh_database_reaches_latest() {
        let mut conn = Connection::open_in_memory().unwrap();
        configure(&conn).unwrap();
        assert_eq!(current_version(&conn).unwrap(), 0);

        migrations().to_latest(&mut conn).unwrap();
        assert_eq!(current_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn foreign_keys_enabled_after_configure() {
        let conn = Connection::open_in_memory().unwrap();
        configure(&conn).unwrap();
        let enabled: bool = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .unwrap();
        assert!(enabled);
    }

    #[test]
    fn epoch_scoped_tables_cascade_from_downloads() {
        let mut conn = Connection::open_in_memory().unwrap();
        configure(&conn).unwrap();
        migrations().to_latest(&mut conn).unwrap();

        let mut stmt = conn
            .prepare(
                "SELECT m.name FROM sqlite_master m, pragma_foreign_key_list(m.name) f
                 WHERE m.type = 'table' AND f.\"table\" = 'downloads' AND f.on_delete = 'CASCADE'
                 ORDER BY m.name",
            )
            .unwrap();
        let tables: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(
            tables,
            vec![
                "avatars",
                "countries",
                "cups",
                "currencies",
                "download_entries",
                "languages",
                "leagues",
                "promotions",
                "regions",
                "users",
            ]
        );
    }
}
