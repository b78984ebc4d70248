use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One synchronization run. Status moves `running -> completed` or
/// `running -> failed` and is never reopened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRun {
    pub id: Uuid,
    pub mode: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_deals: i32,
    pub processed_deals: i32,
    pub successful_deals: i32,
    pub failed_deal_ids: Vec<i64>,
    pub errors: Vec<String>,
    pub duration_ms: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Final counts written when a run reaches a terminal state.
#[derive(Debug, Clone, Default)]
pub struct SyncRunOutcome {
    pub total_deals: i32,
    pub processed_deals: i32,
    pub successful_deals: i32,
    pub failed_deal_ids: Vec<i64>,
    pub errors: Vec<String>,
    pub duration_ms: i64,
}
