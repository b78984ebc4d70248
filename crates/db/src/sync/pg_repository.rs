use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::sync::models::{SyncRun, SyncRunOutcome};
use crate::sync::repositories::SyncRunRepository;
use ventas_common::error::{VentasError, VentasResult};

#[derive(Clone)]
pub struct PgSyncRunRepository {
    pool: PgPool,
}

impl PgSyncRunRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_row(row: sqlx::postgres::PgRow) -> VentasResult<SyncRun> {
        Ok(SyncRun {
            id: row.get("id"),
            mode: row.get("mode"),
            status: row.get("status"),
            started_at: row.get("started_at"),
            completed_at: row.get("completed_at"),
            total_deals: row.get("total_deals"),
            processed_deals: row.get("processed_deals"),
            successful_deals: row.get("successful_deals"),
            failed_deal_ids: row.get("failed_deal_ids"),
            errors: row.get("errors"),
            duration_ms: row.get("duration_ms"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

#[async_trait]
impl SyncRunRepository for PgSyncRunRepository {
    async fn create(&self, mode: &str) -> VentasResult<SyncRun> {
        let row = sqlx::query(
            "insert into deal_sync_runs (id, mode, status, started_at)
             values ($1, $2, 'running', $3)
             returning id, mode, status, started_at, completed_at, total_deals, processed_deals, successful_deals, failed_deal_ids, errors, duration_ms, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(mode)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| VentasError::Database(e.to_string()))?;

        Self::map_row(row)
    }

    async fn set_total_deals(&self, id: Uuid, total_deals: i32) -> VentasResult<()> {
        sqlx::query(
            "update deal_sync_runs
             set total_deals = $1, updated_at = now()
             where id = $2",
        )
        .bind(total_deals)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| VentasError::Database(e.to_string()))?;
        Ok(())
    }

    async fn record_progress(
        &self,
        id: Uuid,
        processed_deals: i32,
        successful_deals: i32,
    ) -> VentasResult<()> {
        sqlx::query(
            "update deal_sync_runs
             set processed_deals = $1, successful_deals = $2, updated_at = now()
             where id = $3",
        )
        .bind(processed_deals)
        .bind(successful_deals)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| VentasError::Database(e.to_string()))?;
        Ok(())
    }

    async fn mark_completed(&self, id: Uuid, outcome: &SyncRunOutcome) -> VentasResult<()> {
        sqlx::query(
            "update deal_sync_runs
             set status = 'completed',
                 completed_at = $1,
                 total_deals = $2,
                 processed_deals = $3,
                 successful_deals = $4,
                 failed_deal_ids = $5,
                 errors = $6,
                 duration_ms = $7,
                 updated_at = $1
             where id = $8",
        )
        .bind(Utc::now())
        .bind(outcome.total_deals)
        .bind(outcome.processed_deals)
        .bind(outcome.successful_deals)
        .bind(&outcome.failed_deal_ids)
        .bind(&outcome.errors)
        .bind(outcome.duration_ms)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| VentasError::Database(e.to_string()))?;
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error: &str, duration_ms: i64) -> VentasResult<()> {
        sqlx::query(
            "update deal_sync_runs
             set status = 'failed',
                 completed_at = $1,
                 errors = array[$2],
                 duration_ms = $3,
                 updated_at = $1
             where id = $4",
        )
        .bind(Utc::now())
        .bind(error)
        .bind(duration_ms)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| VentasError::Database(e.to_string()))?;
        Ok(())
    }

    async fn last_completed_at(&self) -> VentasResult<Option<DateTime<Utc>>> {
        let row = sqlx::query(
            "select max(completed_at) as last_completed
             from deal_sync_runs
             where status = 'completed'",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| VentasError::Database(e.to_string()))?;

        Ok(row.get("last_completed"))
    }

    async fn latest(&self) -> VentasResult<Option<SyncRun>> {
        let row = sqlx::query(
            "select id, mode, status, started_at, completed_at, total_deals, processed_deals, successful_deals, failed_deal_ids, errors, duration_ms, created_at, updated_at
             from deal_sync_runs
             order by started_at desc
             limit 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| VentasError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::map_row(r)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create_pool;
    use tokio::sync::Mutex;

    // The runs table has no per-test partition key, so tests that assert
    // on "latest" serialize through this lock.
    static DB_LOCK: Mutex<()> = Mutex::const_new(());

    async fn test_repo() -> Option<PgSyncRunRepository> {
        let url = std::env::var("TEST_DATABASE_URL").ok()?;
        let pool = create_pool(&url).await.expect("db should connect");

        // Ensure the runs table exists
        sqlx::query(
            "create table if not exists deal_sync_runs (
               id uuid primary key default gen_random_uuid(),
               mode text not null,
               status text not null default 'running',
               started_at timestamptz not null,
               completed_at timestamptz,
               total_deals integer not null default 0,
               processed_deals integer not null default 0,
               successful_deals integer not null default 0,
               failed_deal_ids bigint[] not null default '{}',
               errors text[] not null default '{}',
               duration_ms bigint,
               created_at timestamptz not null default now(),
               updated_at timestamptz not null default now()
             )",
        )
        .execute(&pool)
        .await
        .ok()?;

        Some(PgSyncRunRepository::new(pool))
    }

    #[tokio::test]
    async fn create_starts_running() {
        let _guard = DB_LOCK.lock().await;
        let repo = match test_repo().await {
            Some(r) => r,
            None => return,
        };
        let run = repo.create("full").await.expect("create run");
        assert_eq!(run.mode, "full");
        assert_eq!(run.status, "running");
        assert_eq!(run.total_deals, 0);
        assert!(run.completed_at.is_none());
        assert!(run.failed_deal_ids.is_empty());
        assert!(run.errors.is_empty());
    }

    #[tokio::test]
    async fn checkpoints_update_counts() {
        let _guard = DB_LOCK.lock().await;
        let repo = match test_repo().await {
            Some(r) => r,
            None => return,
        };
        let run = repo.create("incremental").await.expect("create run");
        repo.set_total_deals(run.id, 120).await.expect("set total");
        repo.record_progress(run.id, 80, 77)
            .await
            .expect("record progress");

        let latest = repo.latest().await.expect("latest").expect("some run");
        assert_eq!(latest.id, run.id);
        assert_eq!(latest.total_deals, 120);
        assert_eq!(latest.processed_deals, 80);
        assert_eq!(latest.successful_deals, 77);
        assert_eq!(latest.status, "running");
    }

    #[tokio::test]
    async fn mark_completed_sets_terminal_fields() {
        let _guard = DB_LOCK.lock().await;
        let repo = match test_repo().await {
            Some(r) => r,
            None => return,
        };
        let run = repo.create("full").await.expect("create run");
        let outcome = SyncRunOutcome {
            total_deals: 10,
            processed_deals: 10,
            successful_deals: 9,
            failed_deal_ids: vec![42],
            errors: vec!["Deal 42: request timed out".to_owned()],
            duration_ms: 5_400,
        };
        repo.mark_completed(run.id, &outcome)
            .await
            .expect("mark completed");

        let latest = repo.latest().await.expect("latest").expect("some run");
        assert_eq!(latest.id, run.id);
        assert_eq!(latest.status, "completed");
        assert!(latest.completed_at.is_some());
        assert_eq!(latest.successful_deals, 9);
        assert_eq!(latest.failed_deal_ids, vec![42]);
        assert_eq!(latest.errors.len(), 1);
        assert_eq!(latest.duration_ms, Some(5_400));
    }

    #[tokio::test]
    async fn mark_failed_records_error() {
        let _guard = DB_LOCK.lock().await;
        let repo = match test_repo().await {
            Some(r) => r,
            None => return,
        };
        let run = repo.create("full").await.expect("create run");
        repo.mark_failed(run.id, "Sync failed: deal fetch exploded", 900)
            .await
            .expect("mark failed");

        let latest = repo.latest().await.expect("latest").expect("some run");
        assert_eq!(latest.id, run.id);
        assert_eq!(latest.status, "failed");
        assert!(latest.completed_at.is_some());
        assert_eq!(latest.errors, vec!["Sync failed: deal fetch exploded"]);
    }

    #[tokio::test]
    async fn last_completed_at_ignores_non_completed_runs() {
        let _guard = DB_LOCK.lock().await;
        let repo = match test_repo().await {
            Some(r) => r,
            None => return,
        };
        let done = repo.create("full").await.expect("create completed run");
        repo.mark_completed(done.id, &SyncRunOutcome::default())
            .await
            .expect("complete");
        let failed = repo.create("full").await.expect("create failed run");
        repo.mark_failed(failed.id, "boom", 1).await.expect("fail");

        let last = repo
            .last_completed_at()
            .await
            .expect("query")
            .expect("a completed run exists");
        // The failed run finished later but must not move the watermark.
        assert!(last >= done.started_at);
        let latest = repo.latest().await.expect("latest").expect("some run");
        assert_eq!(latest.id, failed.id);
    }
}
