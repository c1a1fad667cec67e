use anyhow::Result;
use roster_snapshot::DownloadId;
use roster_snapshot_store::SnapshotStore;

use super::format;

pub fn list(store: &SnapshotStore) -> Result<()> {
    let downloads = store.list_downloads()?;
    let current = store.current_epoch()?;
    format::print_downloads(&downloads, current);
    Ok(())
}

pub fn entries(store: &SnapshotStore, id: DownloadId) -> Result<()> {
    let download = store.download(id)?;
    println!("Download {} ({}), started {}", download.id, download.state, download.timestamp);
    format::print_entries(&store.list_entries(id)?);
    println!("Completeness: {}", store.completeness(id)?);
    Ok(())
}

pub fn current(store: &SnapshotStore) -> Result<()> {
    match store.current_epoch()? {
        Some(id) => println!("{id}"),
        None => println!("No download has been promoted yet."),
    }
    Ok(())
}

pub fn discard(store: &SnapshotStore, id: DownloadId) -> Result<()> {
    store.discard_epoch(id)?;
    println!("Download {id} retired.");
    Ok(())
}

pub fn retire(store: &SnapshotStore, id: DownloadId) -> Result<()> {
    store.retire_epoch(id)?;
    println!("Download {id} deleted.");
    Ok(())
}

/// Discard open downloads older than `hours`; with `delete`, remove them too.
pub fn reap(store: &SnapshotStore, hours: i64, delete: bool) -> Result<()> {
    let abandoned = store.abandoned_epochs(chrono::Duration::hours(hours))?;
    if abandoned.is_empty() {
        println!("No abandoned downloads.");
        return Ok(());
    }

    for download in abandoned {
        if store.is_claimed(download.id)? {
            continue;
        }
        store.discard_epoch(download.id)?;
        if delete {
            store.retire_epoch(download.id)?;
            println!("Deleted abandoned download {} (started {}).", download.id, download.timestamp);
        } else {
            println!("Retired abandoned download {} (started {}).", download.id, download.timestamp);
        }
    }
    Ok(())
}
