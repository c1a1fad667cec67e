//! Drives one download epoch: fetch every endpoint, persist what comes
//! back, retry failures in rounds, then evaluate and optionally promote.

use futures::stream::{self, StreamExt};
use roster_snapshot::{
    AttemptOutcome, DownloadEntry, DownloadId, EndpointFetcher, EndpointPayload, EntryStatus,
    EpochState, PromotionPolicy, RetryPolicy, SingletonRow,
};

use crate::error::StoreError;
use crate::promotion::PromotionReport;
use crate::store::SnapshotStore;

/// Knobs for a download run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub retry: RetryPolicy,
    /// Endpoints fetched at once.
    pub concurrency: usize,
    pub auto_promote: bool,
    pub promotion: PromotionPolicy,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            concurrency: 4,
            auto_promote: true,
            promotion: PromotionPolicy::default(),
        }
    }
}

/// Summary of a download run.
#[derive(Debug, Clone)]
pub struct DownloadReport {
    pub download_id: DownloadId,
    pub state: EpochState,
    pub entries: Vec<DownloadEntry>,
    pub rows_written: usize,
    pub promotion: Option<PromotionReport>,
}

impl DownloadReport {
    /// Entries that did not succeed, for operator follow-up.
    pub fn unsuccessful(&self) -> impl Iterator<Item = &DownloadEntry> {
        self.entries
            .iter()
            .filter(|e| e.status != EntryStatus::Succeeded)
    }
}

/// Rows persisted from one payload, and the batches that were rejected.
#[derive(Debug, Default)]
struct Persisted {
    rows: usize,
    rejected: Vec<String>,
}

impl SnapshotStore {
    /// Open a new epoch and fill it from `fetcher`.
    pub async fn run_download(
        &self,
        fetcher: &dyn EndpointFetcher,
        options: &SyncOptions,
    ) -> Result<DownloadReport, StoreError> {
        let id = self.begin_epoch()?;
        tracing::info!(download_id = %id, source = fetcher.label(), "Starting download");
        self.drive(id, fetcher, options).await
    }

    /// Continue an unpromoted epoch: fetch whatever is still pending or
    /// retryable. Rows already written are skipped on re-fetch.
    pub async fn resume_download(
        &self,
        id: DownloadId,
        fetcher: &dyn EndpointFetcher,
        options: &SyncOptions,
    ) -> Result<DownloadReport, StoreError> {
        let state = self.epoch_state(id)?;
        if !state.accepts_writes() {
            return Err(StoreError::Concurrency(format!(
                "download {id} is {state} and cannot be resumed"
            )));
        }
        tracing::info!(download_id = %id, source = fetcher.label(), "Resuming download");
        self.drive(id, fetcher, options).await
    }

    async fn drive(
        &self,
        id: DownloadId,
        fetcher: &dyn EndpointFetcher,
        options: &SyncOptions,
    ) -> Result<DownloadReport, StoreError> {
        let claim = self.claim_epoch(id)?;
        self.register_endpoints(id, &fetcher.endpoints())?;

        let mut targets = self.pending_endpoints(id)?;
        targets.extend(self.next_retryable(id, options.retry.max_retries)?);

        let mut rows_written = 0;
        let mut round = 0u32;
        while !targets.is_empty() {
            if round > 0 {
                let delay = options.retry.delay_for_retry(round);
                tracing::info!(
                    download_id = %id,
                    round,
                    endpoints = targets.len(),
                    delay_ms = delay.as_millis() as u64,
                    "Retrying failed endpoints"
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            } else {
                tracing::info!(download_id = %id, endpoints = targets.len(), "Fetching endpoints");
            }

            let mut results = stream::iter(targets)
                .map(|endpoint| async move {
                    let result = fetcher.fetch(&endpoint).await;
                    (endpoint, result)
                })
                .buffer_unordered(options.concurrency.max(1));

            while let Some((endpoint, result)) = results.next().await {
                let outcome = match result {
                    Ok(payload) => {
                        let persisted = self.persist_payload(id, &payload)?;
                        rows_written += persisted.rows;
                        if persisted.rejected.is_empty() {
                            AttemptOutcome::Succeeded
                        } else {
                            AttemptOutcome::failed(persisted.rejected.join("; "))
                        }
                    }
                    Err(e) => AttemptOutcome::failed(e.to_string()),
                };
                self.record_attempt(id, &endpoint, &outcome)?;
            }

            round += 1;
            targets = self.next_retryable(id, options.retry.max_retries)?;
        }
        drop(claim);

        let state = self.evaluate_epoch(id)?;
        let promotable = match state {
            EpochState::Complete => true,
            EpochState::Partial => options.promotion.allow_partial,
            _ => false,
        };
        let promotion = if options.auto_promote && promotable {
            Some(self.promote(id, &options.promotion)?)
        } else {
            None
        };
        let state = if promotion.is_some() {
            EpochState::Promoted
        } else {
            state
        };

        let entries = self.list_entries(id)?;
        let report = DownloadReport {
            download_id: id,
            state,
            rows_written,
            promotion,
            entries,
        };
        tracing::info!(
            download_id = %id,
            state = %report.state,
            rows = report.rows_written,
            unsuccessful = report.unsuccessful().count(),
            "Download finished"
        );
        Ok(report)
    }

    /// Persist every section of a payload. A rejected batch is collected and
    /// the rest keep going; only a sealed or contested epoch stops the run.
    fn persist_payload(
        &self,
        id: DownloadId,
        payload: &EndpointPayload,
    ) -> Result<Persisted, StoreError> {
        let mut persisted = Persisted::default();

        for batch in &payload.reference {
            match self.write_reference_batch(id, batch) {
                Ok(report) => persisted.rows += report.inserted,
                Err(e) => persisted.reject(e)?,
            }
        }

        for row in &payload.singletons {
            let result = match row {
                SingletonRow::Team(team) => {
                    let mut team = team.clone();
                    self.denormalize_team(id, &mut team)
                        .and_then(|()| self.upsert_singleton(&SingletonRow::Team(team)))
                }
                SingletonRow::Player(_) => self.upsert_singleton(row),
            };
            match result {
                Ok(()) => persisted.rows += 1,
                Err(e) => persisted.reject(e)?,
            }
        }

        for avatar in &payload.avatars {
            match self.write_attachment(avatar.player_id, id, &avatar.image) {
                Ok(_) => persisted.rows += 1,
                Err(e) => persisted.reject(e)?,
            }
        }

        Ok(persisted)
    }
}

impl Persisted {
    fn reject(&mut self, error: StoreError) -> Result<(), StoreError> {
        match error {
            StoreError::Concurrency(_) | StoreError::Database(_) => Err(error),
            other => {
                tracing::warn!(error = %other, "Rejected batch");
                self.rejected.push(other.to_string());
                Ok(())
            }
        }
    }
}
