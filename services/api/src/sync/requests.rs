use serde::Deserialize;

use ventas_common::{VentasError, VentasResult};
use ventas_dealflow::{SyncMode, SyncOptions};

#[derive(Debug, Deserialize)]
pub struct TriggerSyncRequest {
    pub mode: String,
    pub days_back: Option<u32>,
    pub batch_size: Option<usize>,
    pub max_retries: Option<u32>,
    /// Run in the background and return immediately.
    #[serde(default, rename = "async")]
    pub run_async: bool,
}

impl TriggerSyncRequest {
    pub fn to_options(&self) -> VentasResult<SyncOptions> {
        let mode: SyncMode = self.mode.parse()?;

        if let Some(days) = self.days_back {
            if !(1..=365).contains(&days) {
                return Err(VentasError::Validation(
                    "days_back must be between 1 and 365".to_string(),
                ));
            }
        }
        if let Some(batch) = self.batch_size {
            if !(1..=40).contains(&batch) {
                return Err(VentasError::Validation(
                    "batch_size must be between 1 and 40".to_string(),
                ));
            }
        }
        if let Some(retries) = self.max_retries {
            if !(1..=5).contains(&retries) {
                return Err(VentasError::Validation(
                    "max_retries must be between 1 and 5".to_string(),
                ));
            }
        }

        Ok(SyncOptions {
            mode,
            days_back: self.days_back,
            batch_size: self.batch_size,
            max_retries: self.max_retries,
        })
    }
}
