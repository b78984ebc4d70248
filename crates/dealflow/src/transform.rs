//! Derives stage-visit records from a deal's raw flow feed.

use chrono::Utc;
use uuid::Uuid;

use ventas_db::dealflow::models::DealFlowRecord;
use ventas_pipedrive::models::{Deal, FlowEvent};

/// Field key marking a pipeline stage change in the flow feed.
const STAGE_FIELD: &str = "stage_id";

/// Build stage-visit records for one deal from its flow events.
///
/// Keeps only stage-change events, orders them chronologically and links
/// each visit to its successor: a record's `left_at` is the next record's
/// `entered_at`, and the last record stays open. Events with a payload
/// that carries no usable stage id are skipped with a warning.
pub fn stage_records_for_deal(deal: &Deal, events: &[FlowEvent]) -> Vec<DealFlowRecord> {
    let now = Utc::now();
    let mut records: Vec<DealFlowRecord> = Vec::new();

    for event in events {
        if event.object != "dealChange" {
            continue;
        }
        if event.data.field_key.as_deref() != Some(STAGE_FIELD) {
            continue;
        }
        let Some(event_id) = event.data.id else {
            tracing::warn!(deal_id = deal.id, "stage change without an event id, skipping");
            continue;
        };
        let Some(stage_id) = stage_id_value(event.data.new_value.as_ref()) else {
            tracing::warn!(
                deal_id = deal.id,
                event_id,
                "stage change with unparseable stage id, skipping"
            );
            continue;
        };

        let stage_name = event
            .data
            .additional_data
            .as_ref()
            .and_then(|extra| extra.new_value_formatted.clone())
            .unwrap_or_else(|| format!("Stage {stage_id}"));

        records.push(DealFlowRecord {
            id: Uuid::new_v4(),
            event_id,
            deal_id: deal.id,
            pipeline_id: deal.pipeline_id,
            stage_id,
            stage_name,
            entered_at: event.timestamp,
            left_at: None,
            duration_seconds: None,
            created_at: now,
            updated_at: now,
        });
    }

    // Stable sort: events sharing a timestamp keep their feed order.
    records.sort_by_key(|record| record.entered_at);
    link_stage_exits(&mut records);
    records
}

/// Fill `left_at`/`duration_seconds` from each record's successor. Runs
/// on a chronologically sorted slice, so durations are non-negative.
fn link_stage_exits(records: &mut [DealFlowRecord]) {
    for i in 0..records.len() {
        let left_at = records.get(i + 1).map(|next| next.entered_at);
        let record = &mut records[i];
        record.left_at = left_at;
        record.duration_seconds =
            left_at.map(|left| (left - record.entered_at).num_milliseconds() / 1000);
    }
}

/// Stage payloads usually arrive as strings ("5") but occasionally as
/// bare numbers.
fn stage_id_value(value: Option<&serde_json::Value>) -> Option<i64> {
    match value? {
        serde_json::Value::String(s) => s.trim().parse().ok(),
        serde_json::Value::Number(n) => n.as_i64(),
        _ => None,
    }
}
