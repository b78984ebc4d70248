//! Best-effort run status reporting.
//!
//! Checkpoint writes never fail the sync: the engine keeps going when a
//! status update cannot be stored, so a flaky metadata table cannot take
//! down an otherwise healthy run. Reading the last completed run is the
//! one fallible call, because the incremental window depends on it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use ventas_common::VentasResult;
use ventas_db::sync::models::SyncRunOutcome;
use ventas_db::sync::repositories::SyncRunRepository;

#[async_trait]
pub trait StatusSink: Send + Sync {
    /// Open a run record. `None` means the write failed; later
    /// checkpoints for this run become no-ops.
    async fn run_started(&self, mode: &str) -> Option<Uuid>;

    async fn totals_known(&self, run_id: Option<Uuid>, total_deals: i32);

    async fn progress(&self, run_id: Option<Uuid>, processed: i32, successful: i32);

    async fn run_completed(&self, run_id: Option<Uuid>, outcome: &SyncRunOutcome);

    async fn run_failed(&self, run_id: Option<Uuid>, error: &str, duration_ms: i64);

    /// Completion time of the most recent completed run, if any.
    async fn last_completed_at(&self) -> VentasResult<Option<DateTime<Utc>>>;
}

/// Sink backed by the sync-run repository.
pub struct DbStatusSink<S> {
    runs: S,
}

impl<S> DbStatusSink<S> {
    pub fn new(runs: S) -> Self {
        Self { runs }
    }
}

#[async_trait]
impl<S> StatusSink for DbStatusSink<S>
where
    S: SyncRunRepository,
{
    async fn run_started(&self, mode: &str) -> Option<Uuid> {
        match self.runs.create(mode).await {
            Ok(run) => Some(run.id),
            Err(e) => {
                tracing::warn!(error = %e, "could not record sync run start");
                None
            }
        }
    }

    async fn totals_known(&self, run_id: Option<Uuid>, total_deals: i32) {
        let Some(id) = run_id else { return };
        if let Err(e) = self.runs.set_total_deals(id, total_deals).await {
            tracing::warn!(error = %e, "could not checkpoint deal total");
        }
    }

    async fn progress(&self, run_id: Option<Uuid>, processed: i32, successful: i32) {
        let Some(id) = run_id else { return };
        if let Err(e) = self.runs.record_progress(id, processed, successful).await {
            tracing::warn!(error = %e, "could not checkpoint sync progress");
        }
    }

    async fn run_completed(&self, run_id: Option<Uuid>, outcome: &SyncRunOutcome) {
        let Some(id) = run_id else { return };
        if let Err(e) = self.runs.mark_completed(id, outcome).await {
            tracing::warn!(error = %e, "could not mark sync run completed");
        }
    }

    async fn run_failed(&self, run_id: Option<Uuid>, error: &str, duration_ms: i64) {
        let Some(id) = run_id else { return };
        if let Err(e) = self.runs.mark_failed(id, error, duration_ms).await {
            tracing::warn!(error = %e, "could not mark sync run failed");
        }
    }

    async fn last_completed_at(&self) -> VentasResult<Option<DateTime<Utc>>> {
        self.runs.last_completed_at().await
    }
}

/// Sink that records nothing. Ad-hoc runs and tests use it; with no run
/// history, incremental syncs fall back to their bootstrap window.
pub struct NoopStatusSink;

#[async_trait]
impl StatusSink for NoopStatusSink {
    async fn run_started(&self, _mode: &str) -> Option<Uuid> {
        None
    }

    async fn totals_known(&self, _run_id: Option<Uuid>, _total_deals: i32) {}

    async fn progress(&self, _run_id: Option<Uuid>, _processed: i32, _successful: i32) {}

    async fn run_completed(&self, _run_id: Option<Uuid>, _outcome: &SyncRunOutcome) {}

    async fn run_failed(&self, _run_id: Option<Uuid>, _error: &str, _duration_ms: i64) {}

    async fn last_completed_at(&self) -> VentasResult<Option<DateTime<Utc>>> {
        Ok(None)
    }
}
