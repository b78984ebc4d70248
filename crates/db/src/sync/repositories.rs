use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::sync::models::{SyncRun, SyncRunOutcome};
use ventas_common::error::VentasResult;

#[async_trait]
pub trait SyncRunRepository: Send + Sync {
    /// Insert a new run with status 'running' and the given mode.
    async fn create(&self, mode: &str) -> VentasResult<SyncRun>;

    /// Record the discovered deal count once the candidate set is known.
    async fn set_total_deals(&self, id: Uuid, total_deals: i32) -> VentasResult<()>;

    /// Mid-run checkpoint of processed/successful counts.
    async fn record_progress(
        &self,
        id: Uuid,
        processed_deals: i32,
        successful_deals: i32,
    ) -> VentasResult<()>;

    /// Terminal transition to 'completed' with final counts and duration.
    async fn mark_completed(&self, id: Uuid, outcome: &SyncRunOutcome) -> VentasResult<()>;

    /// Terminal transition to 'failed' with the run-level error message.
    async fn mark_failed(&self, id: Uuid, error: &str, duration_ms: i64) -> VentasResult<()>;

    /// Completion time of the most recent completed run, if any.
    async fn last_completed_at(&self) -> VentasResult<Option<DateTime<Utc>>>;

    /// Most recently started run, if any.
    async fn latest(&self) -> VentasResult<Option<SyncRun>>;
}
