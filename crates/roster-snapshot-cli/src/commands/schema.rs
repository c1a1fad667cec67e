use std::path::Path;

use anyhow::{Context, Result};
use roster_snapshot_store::schema;

/// Migrate the database at `path` to `target` (latest when omitted).
pub fn run(path: &Path, target: Option<usize>) -> Result<()> {
    let (before, after) = schema::migrate_file(path, target)
        .with_context(|| format!("failed to migrate {}", path.display()))?;

    if before == after {
        println!("Schema already at version {after}.");
    } else {
        println!("Schema migrated from version {before} to {after}.");
    }
    Ok(())
}
