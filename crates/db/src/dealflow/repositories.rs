use async_trait::async_trait;

use crate::dealflow::models::DealFlowRecord;
use ventas_common::error::VentasResult;

#[async_trait]
pub trait DealFlowRepository: Send + Sync {
    /// Upsert a batch of records keyed on `event_id`. Re-delivery of an
    /// event updates stage_name/left_at/duration_seconds in place.
    /// Returns the number of records written.
    async fn upsert_records(&self, records: &[DealFlowRecord]) -> VentasResult<usize>;

    /// Delete records whose `entered_at` is older than `days` days.
    /// Returns the number of rows removed.
    async fn delete_older_than(&self, days: i32) -> VentasResult<u64>;

    /// All stored records for one deal, ordered by entry time.
    async fn records_for_deal(&self, deal_id: i64) -> VentasResult<Vec<DealFlowRecord>>;
}
