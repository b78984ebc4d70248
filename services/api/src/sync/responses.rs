use serde::Serialize;

use ventas_db::dealflow::models::DealFlowRecord;
use ventas_db::sync::models::SyncRun;
use ventas_dealflow::{SyncMode, SyncReport};

#[derive(Debug, Serialize)]
pub struct SyncTriggerResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started: Option<bool>,
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<SyncReportBody>,
}

impl SyncTriggerResponse {
    /// Acknowledgment for a background run.
    pub fn started(mode: SyncMode) -> Self {
        Self {
            started: Some(true),
            mode: mode.as_str().to_string(),
            report: None,
        }
    }

    pub fn completed(mode: SyncMode, report: &SyncReport) -> Self {
        Self {
            started: None,
            mode: mode.as_str().to_string(),
            report: Some(SyncReportBody::from_report(report)),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SyncReportBody {
    pub total_deals: usize,
    pub processed_deals: usize,
    pub successful_deals: usize,
    pub failed_deals: Vec<i64>,
    pub errors: Vec<String>,
    pub duration_ms: i64,
    pub success_rate: String,
}

impl SyncReportBody {
    pub fn from_report(report: &SyncReport) -> Self {
        let rate = if report.total_deals == 0 {
            0.0
        } else {
            report.successful_deals as f64 / report.total_deals as f64 * 100.0
        };
        Self {
            total_deals: report.total_deals,
            processed_deals: report.processed_deals,
            successful_deals: report.successful_deals,
            failed_deals: report.failed_deals.clone(),
            errors: report.errors.clone(),
            duration_ms: report.duration_ms,
            success_rate: format!("{rate:.1}%"),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SyncStatusResponse {
    pub data: SyncRun,
}

#[derive(Debug, Serialize)]
pub struct DealFlowResponse {
    pub deal_id: i64,
    pub data: Vec<DealFlowRecord>,
    pub count: usize,
}
