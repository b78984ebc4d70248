pub mod handlers;
pub mod requests;
pub mod responses;

use axum::routing::{get, post};
use axum::Router;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/sync/deal-flow", post(handlers::trigger_deal_flow_sync))
        .route("/admin/sync/status", get(handlers::get_sync_status))
        .route("/admin/deals/{deal_id}/flow", get(handlers::get_deal_flow))
        .route("/cron/sync/deal-flow", post(handlers::cron_deal_flow_sync))
}
