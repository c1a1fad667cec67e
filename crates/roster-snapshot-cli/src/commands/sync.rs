use anyhow::Result;
use roster_snapshot::{DownloadId, EndpointFetcher, EpochState};
use roster_snapshot_store::{SnapshotStore, SyncOptions};

use super::format;

/// Run a fresh download and print the outcome.
pub async fn run(
    store: &SnapshotStore,
    fetcher: &dyn EndpointFetcher,
    options: &SyncOptions,
) -> Result<()> {
    println!("Downloading from {}...", fetcher.label());
    let report = store.run_download(fetcher, options).await?;
    format::print_report(&report);
    warn_if_unpromoted(report.state, options);
    Ok(())
}

/// Continue an unpromoted download. With `rearm`, exhausted endpoints get a
/// fresh retry budget first.
pub async fn resume(
    store: &SnapshotStore,
    id: DownloadId,
    fetcher: &dyn EndpointFetcher,
    options: &SyncOptions,
    rearm: bool,
) -> Result<()> {
    if rearm {
        let count = store.rearm_exhausted(id)?;
        println!("Re-armed {count} exhausted endpoints.");
    }
    println!("Resuming download {id} from {}...", fetcher.label());
    let report = store.resume_download(id, fetcher, options).await?;
    format::print_report(&report);
    warn_if_unpromoted(report.state, options);
    Ok(())
}

fn warn_if_unpromoted(state: EpochState, options: &SyncOptions) {
    match state {
        EpochState::Partial if options.auto_promote => eprintln!(
            "warning: required endpoints failed; the current download was left in place. \
             Resume with --rearm or promote with allow_partial."
        ),
        EpochState::Open => {
            eprintln!("warning: download is still open; some endpoints were never attempted.")
        }
        _ => {}
    }
}
