pub mod dealflow;
pub mod sync;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use ventas_common::error::{VentasError, VentasResult};

/// Create a Postgres connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> VentasResult<PgPool> {
    tracing::info!("connecting to database");
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .map_err(|e| VentasError::Database(e.to_string()))
}
