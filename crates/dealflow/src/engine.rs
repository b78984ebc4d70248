//! Deal flow synchronization engine.
//!
//! Pulls recently updated deals from Pipedrive, derives stage-visit
//! records from each deal's flow feed and upserts them into Postgres.
//! Failures are isolated per deal: one bad deal never aborts the run.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use ventas_common::{VentasError, VentasResult};
use ventas_db::dealflow::repositories::DealFlowRepository;
use ventas_db::sync::models::SyncRunOutcome;
use ventas_pipedrive::models::Deal;
use ventas_pipedrive::PipedriveClient;

use crate::progress::ProgressTracker;
use crate::rate_limit::RateLimiter;
use crate::status::StatusSink;
use crate::transform::stage_records_for_deal;

const DEFAULT_BATCH_SIZE: usize = 40;
const MAX_BATCH_SIZE: usize = 40;
const DEFAULT_MAX_RETRIES: u32 = 1;
const MAX_RETRY_ATTEMPTS: u32 = 5;
const FULL_SYNC_DAYS_BACK: u32 = 365;
const BOOTSTRAP_DAYS_BACK: u32 = 7;
const CHECKPOINT_EVERY_BATCHES: usize = 10;

const MINUTES_PER_DAY: u64 = 24 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Wide window (a year by default) plus cleanup of stale records.
    Full,
    /// Window sized from the last completed run.
    Incremental,
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Full => "full",
            SyncMode::Incremental => "incremental",
        }
    }
}

impl std::str::FromStr for SyncMode {
    type Err = VentasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(SyncMode::Full),
            "incremental" => Ok(SyncMode::Incremental),
            other => Err(VentasError::Validation(format!(
                "unknown sync mode: {other}"
            ))),
        }
    }
}

/// Tuning knobs for one run. `None` falls back to the mode's defaults.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub mode: SyncMode,
    pub days_back: Option<u32>,
    pub batch_size: Option<usize>,
    pub max_retries: Option<u32>,
}

impl SyncOptions {
    pub fn full() -> Self {
        Self {
            mode: SyncMode::Full,
            days_back: None,
            batch_size: None,
            max_retries: None,
        }
    }

    pub fn incremental() -> Self {
        Self {
            mode: SyncMode::Incremental,
            ..Self::full()
        }
    }
}

/// Outcome of a finished run. `errors` holds one `Deal <id>: <reason>`
/// line per failed deal, in processing order.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub total_deals: usize,
    pub processed_deals: usize,
    pub successful_deals: usize,
    pub failed_deals: Vec<i64>,
    pub errors: Vec<String>,
    pub duration_ms: i64,
}

pub struct DealFlowSyncer<D, K> {
    client: PipedriveClient,
    flow_repo: D,
    status: K,
    limiter: RateLimiter,
}

impl<D, K> DealFlowSyncer<D, K>
where
    D: DealFlowRepository,
    K: StatusSink,
{
    pub fn new(client: PipedriveClient, flow_repo: D, status: K, limiter: RateLimiter) -> Self {
        Self {
            client,
            flow_repo,
            status,
            limiter,
        }
    }

    /// Run one synchronization pass.
    ///
    /// Per-deal failures land in the report; only run-level problems
    /// (the deal listing itself failing) surface as an error, wrapped as
    /// `Sync failed: ...` and mirrored into the run record.
    pub async fn sync_deal_flow(&self, options: &SyncOptions) -> VentasResult<SyncReport> {
        let started = Instant::now();
        tracing::info!(mode = options.mode.as_str(), "starting deal flow sync");

        let run_id = self.status.run_started(options.mode.as_str()).await;
        let mut progress = ProgressTracker::new();

        match self.execute(run_id, options, &mut progress).await {
            Ok(mut report) => {
                report.duration_ms = started.elapsed().as_millis() as i64;
                self.status.run_completed(run_id, &report_outcome(&report)).await;
                progress.log_completion(
                    report.total_deals,
                    report.successful_deals,
                    report.failed_deals.len(),
                    report.duration_ms,
                );
                Ok(report)
            }
            Err(e) => {
                let duration_ms = started.elapsed().as_millis() as i64;
                let wrapped = VentasError::Sync(e.to_string());
                let message = wrapped.to_string();
                progress.log_error(&message, Some("deal flow sync"));
                self.status.run_failed(run_id, &message, duration_ms).await;
                Err(wrapped)
            }
        }
    }

    async fn execute(
        &self,
        run_id: Option<Uuid>,
        options: &SyncOptions,
        progress: &mut ProgressTracker,
    ) -> VentasResult<SyncReport> {
        let days_back = self.resolve_window(options).await?;
        let batch_size = options
            .batch_size
            .unwrap_or(DEFAULT_BATCH_SIZE)
            .clamp(1, MAX_BATCH_SIZE);
        let max_retries = options
            .max_retries
            .unwrap_or(DEFAULT_MAX_RETRIES)
            .clamp(1, MAX_RETRY_ATTEMPTS);

        tracing::info!(
            mode = options.mode.as_str(),
            days_back,
            batch_size,
            max_retries,
            "resolved sync window"
        );

        let deals = self
            .client
            .fetch_all_deals_updated_since(days_back)
            .await
            .map_err(|e| VentasError::ExternalApi(e.to_string()))?;

        let total = deals.len();
        tracing::info!(count = total, "fetched candidate deals");
        self.status.totals_known(run_id, total as i32).await;

        let mut report = SyncReport {
            total_deals: total,
            ..Default::default()
        };
        progress.start();

        let total_batches = total.div_ceil(batch_size);
        for (index, chunk) in deals.chunks(batch_size).enumerate() {
            let batch_number = index + 1;

            // Each batch claims one limiter slot before its flow calls
            // go out; deals inside the batch run concurrently.
            self.limiter.wait_for_slot().await;

            let results = futures::future::join_all(
                chunk
                    .iter()
                    .map(|deal| self.process_single_deal(deal, max_retries)),
            )
            .await;

            for (deal, result) in chunk.iter().zip(results) {
                report.processed_deals += 1;
                match result {
                    Ok(()) => report.successful_deals += 1,
                    Err(e) => {
                        report.failed_deals.push(deal.id);
                        report.errors.push(format!("Deal {}: {e}", deal.id));
                    }
                }
            }

            progress.log_progress(batch_number, total_batches, report.processed_deals, total);

            if batch_number % CHECKPOINT_EVERY_BATCHES == 0 {
                self.status
                    .progress(
                        run_id,
                        report.processed_deals as i32,
                        report.successful_deals as i32,
                    )
                    .await;
            }
        }

        if options.mode == SyncMode::Full {
            match self.flow_repo.delete_older_than(days_back as i32).await {
                Ok(deleted) => {
                    tracing::info!(deleted, days_back, "pruned stale deal flow records");
                }
                Err(e) => tracing::warn!(error = %e, "deal flow cleanup failed"),
            }
        }

        Ok(report)
    }

    /// Days of history to request. An explicit `days_back` always wins;
    /// otherwise full mode takes a year and incremental mode covers the
    /// gap since the last completed run, bootstrapping to a week when
    /// there is no history.
    async fn resolve_window(&self, options: &SyncOptions) -> VentasResult<u32> {
        if let Some(days) = options.days_back {
            return Ok(days.max(1));
        }
        match options.mode {
            SyncMode::Full => Ok(FULL_SYNC_DAYS_BACK),
            SyncMode::Incremental => match self.status.last_completed_at().await? {
                Some(at) => Ok(days_since(at, Utc::now())),
                None => Ok(BOOTSTRAP_DAYS_BACK),
            },
        }
    }

    async fn process_single_deal(&self, deal: &Deal, max_retries: u32) -> VentasResult<()> {
        let mut attempt = 1;
        loop {
            match self.sync_one(deal).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < max_retries => {
                    let backoff_secs = 1u64 << attempt;
                    tracing::warn!(
                        deal_id = deal.id,
                        attempt,
                        backoff_secs,
                        error = %e,
                        "deal sync attempt failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn sync_one(&self, deal: &Deal) -> VentasResult<()> {
        let events = self
            .client
            .fetch_deal_flow(deal.id)
            .await
            .map_err(|e| VentasError::ExternalApi(e.to_string()))?;

        let records = stage_records_for_deal(deal, &events);
        if records.is_empty() {
            return Ok(());
        }
        self.flow_repo.upsert_records(&records).await?;
        Ok(())
    }
}

fn report_outcome(report: &SyncReport) -> SyncRunOutcome {
    SyncRunOutcome {
        total_deals: report.total_deals as i32,
        processed_deals: report.processed_deals as i32,
        successful_deals: report.successful_deals as i32,
        failed_deal_ids: report.failed_deals.clone(),
        errors: report.errors.clone(),
        duration_ms: report.duration_ms,
    }
}

/// Whole days covering the gap since `last`, rounded up, minimum one.
fn days_since(last: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    let minutes = (now - last).num_minutes().max(0) as u64;
    minutes.div_ceil(MINUTES_PER_DAY).max(1) as u32
}
