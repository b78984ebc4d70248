use ventas_config::init_tracing;
use ventas_db::dealflow::pg_repository::PgDealFlowRepository;
use ventas_db::sync::pg_repository::PgSyncRunRepository;
use ventas_dealflow::{DbStatusSink, DealFlowSyncer, RateLimiter, SyncMode, SyncOptions};
use ventas_pipedrive::{PipedriveClient, PipedriveConfig};

/// Run parameters from the environment. `SYNC_MODE` defaults to a full
/// refresh with the scheduled-run retry budget; window and batch sizing
/// stay with the engine unless overridden.
fn options_from_env() -> SyncOptions {
    let mode = match std::env::var("SYNC_MODE") {
        Ok(v) => v.parse::<SyncMode>().expect("invalid SYNC_MODE"),
        Err(_) => SyncMode::Full,
    };

    SyncOptions {
        mode,
        days_back: env_parse("SYNC_DAYS_BACK"),
        batch_size: env_parse("SYNC_BATCH_SIZE"),
        max_retries: env_parse("SYNC_MAX_RETRIES").or(Some(2)),
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

#[tokio::main]
async fn main() {
    init_tracing("info");
    let _ = dotenvy::dotenv();

    tracing::info!(service = "ventas-sync", "starting");

    // Optional connector: without credentials this runner is a no-op.
    let config = match PipedriveConfig::from_env() {
        Ok(Some(config)) => config,
        Ok(None) => {
            tracing::info!("no pipedrive credentials found, skipping deal flow sync");
            return;
        }
        Err(e) => {
            panic!("pipedrive configuration error (fail-fast): {e}");
        }
    };

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = ventas_db::create_pool(&database_url)
        .await
        .expect("failed to connect to database");

    let client = PipedriveClient::new(config).expect("failed to create pipedrive client");
    let flow_repo = PgDealFlowRepository::new(pool.clone());
    let status = DbStatusSink::new(PgSyncRunRepository::new(pool));

    let syncer = DealFlowSyncer::new(client, flow_repo, status, RateLimiter::default());
    let options = options_from_env();

    tracing::info!(mode = options.mode.as_str(), "deal flow sync configured");

    match syncer.sync_deal_flow(&options).await {
        Ok(report) => {
            tracing::info!(
                total = report.total_deals,
                successful = report.successful_deals,
                failed = report.failed_deals.len(),
                duration_ms = report.duration_ms,
                "deal flow sync completed"
            );
        }
        Err(e) => {
            tracing::error!(error = %e, "deal flow sync failed");
            std::process::exit(1);
        }
    }
}
