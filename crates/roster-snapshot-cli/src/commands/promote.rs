use anyhow::Result;
use roster_snapshot::{DownloadId, PromotionPolicy};
use roster_snapshot_store::SnapshotStore;

pub fn run(store: &SnapshotStore, id: DownloadId, policy: &PromotionPolicy) -> Result<()> {
    let report = store.promote(id, policy)?;
    println!("Download {} is now current.", report.promoted);
    if let Some(previous) = report.superseded {
        println!("Retired previous download {previous}.");
    }
    for purged in &report.purged {
        println!("Deleted download {purged} (retention).");
    }
    Ok(())
}

pub fn prune(store: &SnapshotStore, keep_previous: usize) -> Result<()> {
    let purged = store.apply_retention(keep_previous)?;
    if purged.is_empty() {
        println!("Nothing to prune.");
    }
    for id in &purged {
        println!("Deleted download {id}.");
    }
    Ok(())
}
