use axum::extract::{Path, State};
use axum::http::{header, HeaderMap};
use axum::Json;

use ventas_common::{VentasError, VentasResult};
use ventas_db::dealflow::repositories::DealFlowRepository;
use ventas_db::sync::repositories::SyncRunRepository;
use ventas_dealflow::{SyncMode, SyncOptions};

use crate::error::ApiError;
use crate::AppState;

use super::requests::TriggerSyncRequest;
use super::responses::{DealFlowResponse, SyncStatusResponse, SyncTriggerResponse};

pub async fn trigger_deal_flow_sync(
    State(state): State<AppState>,
    Json(body): Json<TriggerSyncRequest>,
) -> Result<Json<SyncTriggerResponse>, ApiError> {
    let options = body.to_options()?;
    ensure_no_running_run(&state).await?;

    let syncer = state.syncer()?;
    let mode = options.mode;

    if body.run_async {
        tokio::spawn(async move {
            if let Err(e) = syncer.sync_deal_flow(&options).await {
                tracing::error!(error = %e, "background deal flow sync failed");
            }
        });
        return Ok(Json(SyncTriggerResponse::started(mode)));
    }

    let report = syncer.sync_deal_flow(&options).await?;
    Ok(Json(SyncTriggerResponse::completed(mode, &report)))
}

/// Scheduled trigger: fixed full-refresh parameters, guarded by the
/// shared-secret header.
pub async fn cron_deal_flow_sync(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SyncTriggerResponse>, ApiError> {
    authorize_cron(&headers, state.cron_secret.as_deref())?;
    ensure_no_running_run(&state).await?;

    let options = SyncOptions {
        days_back: Some(365),
        batch_size: Some(40),
        max_retries: Some(2),
        ..SyncOptions::full()
    };

    let syncer = state.syncer()?;
    let report = syncer.sync_deal_flow(&options).await?;
    Ok(Json(SyncTriggerResponse::completed(SyncMode::Full, &report)))
}

pub async fn get_sync_status(
    State(state): State<AppState>,
) -> Result<Json<SyncStatusResponse>, ApiError> {
    let run = state
        .sync_runs
        .latest()
        .await?
        .ok_or_else(|| VentasError::NotFound("no sync runs recorded yet".to_string()))?;

    Ok(Json(SyncStatusResponse { data: run }))
}

pub async fn get_deal_flow(
    State(state): State<AppState>,
    Path(deal_id): Path<i64>,
) -> Result<Json<DealFlowResponse>, ApiError> {
    let data = state.flow_repo.records_for_deal(deal_id).await?;
    let count = data.len();
    Ok(Json(DealFlowResponse {
        deal_id,
        data,
        count,
    }))
}

async fn ensure_no_running_run(state: &AppState) -> Result<(), ApiError> {
    if let Some(run) = state.sync_runs.latest().await? {
        if run.status == "running" {
            return Err(ApiError(VentasError::Conflict(
                "a deal flow sync is already running".to_string(),
            )));
        }
    }
    Ok(())
}

/// The raw `Authorization` header must equal the configured secret.
/// With no secret configured the endpoint stays open, matching how
/// unsecured dev environments run.
fn authorize_cron(headers: &HeaderMap, secret: Option<&str>) -> VentasResult<()> {
    let Some(secret) = secret else {
        return Ok(());
    };
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    if presented == Some(secret) {
        Ok(())
    } else {
        Err(VentasError::Unauthorized(
            "invalid cron credentials".to_string(),
        ))
    }
}
