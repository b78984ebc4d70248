use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::dealflow::models::DealFlowRecord;
use crate::dealflow::repositories::DealFlowRepository;
use ventas_common::error::{VentasError, VentasResult};

#[derive(Clone)]
pub struct PgDealFlowRepository {
    pool: PgPool,
}

impl PgDealFlowRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_row(row: sqlx::postgres::PgRow) -> VentasResult<DealFlowRecord> {
        Ok(DealFlowRecord {
            id: row.get("id"),
            event_id: row.get("event_id"),
            deal_id: row.get("deal_id"),
            pipeline_id: row.get("pipeline_id"),
            stage_id: row.get("stage_id"),
            stage_name: row.get("stage_name"),
            entered_at: row.get("entered_at"),
            left_at: row.get("left_at"),
            duration_seconds: row.get("duration_seconds"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

#[async_trait]
impl DealFlowRepository for PgDealFlowRepository {
    async fn upsert_records(&self, records: &[DealFlowRecord]) -> VentasResult<usize> {
        for record in records {
            sqlx::query(
                "insert into deal_flow_records
                 (id, event_id, deal_id, pipeline_id, stage_id, stage_name, entered_at, left_at, duration_seconds)
                 values ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                 on conflict (event_id) do update set
                   stage_name = excluded.stage_name,
                   left_at = excluded.left_at,
                   duration_seconds = excluded.duration_seconds,
                   updated_at = now()",
            )
            .bind(record.id)
            .bind(record.event_id)
            .bind(record.deal_id)
            .bind(record.pipeline_id)
            .bind(record.stage_id)
            .bind(&record.stage_name)
            .bind(record.entered_at)
            .bind(record.left_at)
            .bind(record.duration_seconds)
            .execute(&self.pool)
            .await
            .map_err(|e| VentasError::Database(e.to_string()))?;
        }
        Ok(records.len())
    }

    async fn delete_older_than(&self, days: i32) -> VentasResult<u64> {
        let result = sqlx::query(
            "delete from deal_flow_records
             where entered_at < now() - make_interval(days => $1)",
        )
        .bind(days)
        .execute(&self.pool)
        .await
        .map_err(|e| VentasError::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn records_for_deal(&self, deal_id: i64) -> VentasResult<Vec<DealFlowRecord>> {
        let rows = sqlx::query(
            "select id, event_id, deal_id, pipeline_id, stage_id, stage_name, entered_at, left_at, duration_seconds, created_at, updated_at
             from deal_flow_records
             where deal_id = $1
             order by entered_at",
        )
        .bind(deal_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| VentasError::Database(e.to_string()))?;

        rows.into_iter().map(Self::map_row).collect()
    }
}
