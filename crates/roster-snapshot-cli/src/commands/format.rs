use roster_snapshot::{Download, DownloadEntry, DownloadId};
use roster_snapshot_store::DownloadReport;

const MAX_ERROR_WIDTH: usize = 60;

pub fn print_downloads(downloads: &[Download], current: Option<DownloadId>) {
    if downloads.is_empty() {
        println!("No downloads.");
        return;
    }

    println!("  {:>6}  {:<10}  {}", "ID", "STATE", "STARTED");
    for download in downloads {
        let marker = if Some(download.id) == current { "*" } else { " " };
        println!(
            "{marker} {:>6}  {:<10}  {}",
            download.id.to_string(),
            download.state.as_str(),
            download.timestamp
        );
    }
    println!("\n{} downloads", downloads.len());
}

pub fn print_entries(entries: &[DownloadEntry]) {
    if entries.is_empty() {
        println!("No tracked endpoints.");
        return;
    }

    let name_width = entries
        .iter()
        .map(|e| e.endpoint.chars().count() + e.version.chars().count() + 1)
        .max()
        .unwrap_or(0);

    for entry in entries {
        let name = format!("{}/{}", entry.endpoint, entry.version);
        let optional = if entry.required { "" } else { " (optional)" };
        let error = entry
            .error_message
            .as_deref()
            .map(|e| format!("  {}", truncate(e, MAX_ERROR_WIDTH)))
            .unwrap_or_default();
        println!(
            "  {:<width$}  {:<9}  retries={}{optional}{error}",
            name,
            entry.status.as_str(),
            entry.retry_count,
            width = name_width
        );
    }
}

pub fn print_report(report: &DownloadReport) {
    println!(
        "Download {} finished as {} ({} rows written).",
        report.download_id, report.state, report.rows_written
    );

    let unsuccessful: Vec<DownloadEntry> = report.unsuccessful().cloned().collect();
    if !unsuccessful.is_empty() {
        println!("Endpoints needing attention:");
        print_entries(&unsuccessful);
    }

    if let Some(promotion) = &report.promotion {
        if let Some(previous) = promotion.superseded {
            println!("Retired previous download {previous}.");
        }
        for purged in &promotion.purged {
            println!("Deleted download {purged} (retention).");
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_owned();
    }
    let kept: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}
