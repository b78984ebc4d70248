use std::time::Duration;

use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use crate::models::{ApiResponse, Deal, FlowEvent, RecentItem};

const DEFAULT_BASE_URL: &str = "https://api.pipedrive.com";
const PAGE_LIMIT: i64 = 100;

#[derive(Debug, Clone)]
pub struct PipedriveConfig {
    pub base_url: String,
    pub api_token: String,
    pub timeout_secs: u64,
}

impl PipedriveConfig {
    /// Load Pipedrive config from environment.
    ///
    /// Returns `Ok(None)` if Pipedrive is not configured (no API token).
    /// Returns `Err` if a token IS set but `PIPEDRIVE_BASE_URL` is not an
    /// http(s) URL (fail-fast on misconfiguration).
    pub fn from_env() -> Result<Option<Self>, String> {
        let api_token = match std::env::var("PIPEDRIVE_API_TOKEN")
            .ok()
            .filter(|v| !v.is_empty())
        {
            Some(v) => v,
            None => return Ok(None),
        };

        let base_url =
            std::env::var("PIPEDRIVE_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_owned());
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(format!(
                "PIPEDRIVE_BASE_URL must be an http(s) URL, got: {base_url}"
            ));
        }

        let timeout_secs = std::env::var("PIPEDRIVE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);

        Ok(Some(Self {
            base_url,
            api_token,
            timeout_secs,
        }))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipedriveError {
    #[error("HTTP {status}: {body}")]
    HttpError { status: StatusCode, body: String },

    #[error("request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("api error: {0}")]
    ApiError(String),
}

/// Thin client over the Pipedrive v1 API. Calls are single-attempt; the
/// sync engine owns the per-deal retry budget.
#[derive(Clone)]
pub struct PipedriveClient {
    client: Client,
    config: PipedriveConfig,
}

impl PipedriveClient {
    pub fn new(config: PipedriveConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    /// For testing: create a client pointing at a specific base URL (e.g., wiremock).
    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.config.base_url = base_url.to_string();
        self
    }

    /// Fetch every deal updated within the trailing `days_back` days,
    /// following pagination until the collection is exhausted.
    pub async fn fetch_all_deals_updated_since(
        &self,
        days_back: u32,
    ) -> Result<Vec<Deal>, PipedriveError> {
        let since = (Utc::now() - chrono::Duration::days(i64::from(days_back)))
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();

        let mut start: i64 = 0;
        let mut deals = Vec::new();

        loop {
            let start_param = start.to_string();
            let limit_param = PAGE_LIMIT.to_string();
            let envelope: ApiResponse<Vec<RecentItem>> = self
                .get_json(
                    "/v1/recents",
                    &[
                        ("items", "deal"),
                        ("since_timestamp", since.as_str()),
                        ("start", start_param.as_str()),
                        ("limit", limit_param.as_str()),
                    ],
                )
                .await?;

            for item in envelope.data.unwrap_or_default() {
                if item.item != "deal" {
                    continue;
                }
                // Deleted deals come back with a null payload
                if let Some(deal) = item.data {
                    deals.push(deal);
                }
            }

            match envelope.additional_data.and_then(|a| a.pagination) {
                Some(p) if p.more_items_in_collection => {
                    start = p.next_start.unwrap_or(start + PAGE_LIMIT);
                }
                _ => break,
            }
        }

        tracing::debug!(count = deals.len(), days_back, "fetched updated deals");
        Ok(deals)
    }

    /// Fetch the full flow feed (change events, notes, activities) for one deal.
    pub async fn fetch_deal_flow(&self, deal_id: i64) -> Result<Vec<FlowEvent>, PipedriveError> {
        let path = format!("/v1/deals/{deal_id}/flow");
        let mut start: i64 = 0;
        let mut events = Vec::new();

        loop {
            let start_param = start.to_string();
            let limit_param = PAGE_LIMIT.to_string();
            let envelope: ApiResponse<Vec<FlowEvent>> = self
                .get_json(
                    &path,
                    &[
                        ("start", start_param.as_str()),
                        ("limit", limit_param.as_str()),
                    ],
                )
                .await?;

            events.extend(envelope.data.unwrap_or_default());

            match envelope.additional_data.and_then(|a| a.pagination) {
                Some(p) if p.more_items_in_collection => {
                    start = p.next_start.unwrap_or(start + PAGE_LIMIT);
                }
                _ => break,
            }
        }

        Ok(events)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<ApiResponse<T>, PipedriveError> {
        let url = format!("{}{}", self.config.base_url, path);
        let response = self
            .client
            .get(&url)
            .query(query)
            .query(&[("api_token", self.config.api_token.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipedriveError::HttpError { status, body });
        }

        let envelope: ApiResponse<T> = response.json().await?;
        if !envelope.success {
            return Err(PipedriveError::ApiError(
                envelope
                    .error
                    .unwrap_or_else(|| "request was not successful".to_owned()),
            ));
        }
        Ok(envelope)
    }
}
