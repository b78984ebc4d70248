use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One stage visit for a deal, derived from a CRM stage-change event.
///
/// `event_id` is the CRM's change-event identifier and the idempotency
/// key: re-syncing the same deal updates rows in place instead of
/// duplicating them. `left_at`/`duration_seconds` stay null while the
/// deal is still in the stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealFlowRecord {
    pub id: Uuid,
    pub event_id: i64,
    pub deal_id: i64,
    pub pipeline_id: i64,
    pub stage_id: i64,
    pub stage_name: String,
    pub entered_at: DateTime<Utc>,
    pub left_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
