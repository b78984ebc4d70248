use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Standard Pipedrive response envelope: `success` + `data` plus optional
/// pagination under `additional_data`.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default)]
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub additional_data: Option<AdditionalData>,
}

#[derive(Debug, Deserialize)]
pub struct AdditionalData {
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub more_items_in_collection: bool,
    #[serde(default)]
    pub next_start: Option<i64>,
}

/// One entry from `/v1/recents`. Deleted records come back with a null
/// `data` payload; `item` distinguishes deals from other record kinds.
#[derive(Debug, Clone, Deserialize)]
pub struct RecentItem {
    pub item: String,
    #[serde(default)]
    pub data: Option<Deal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Deal {
    pub id: i64,
    pub pipeline_id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "pd_timestamp::deserialize_opt")]
    pub update_time: Option<DateTime<Utc>>,
}

/// One entry from `/v1/deals/{id}/flow`. The flow feed mixes change
/// events with notes, files and activities; only `object == "dealChange"`
/// entries carry a `field_key`.
#[derive(Debug, Clone, Deserialize)]
pub struct FlowEvent {
    pub object: String,
    #[serde(deserialize_with = "pd_timestamp::deserialize")]
    pub timestamp: DateTime<Utc>,
    pub data: FlowEventData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlowEventData {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub item_id: Option<i64>,
    #[serde(default)]
    pub field_key: Option<String>,
    #[serde(default)]
    pub new_value: Option<serde_json::Value>,
    #[serde(default)]
    pub additional_data: Option<FlowEventExtra>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlowEventExtra {
    #[serde(default)]
    pub new_value_formatted: Option<String>,
}

/// Pipedrive serializes timestamps as naive `YYYY-MM-DD HH:MM:SS` strings
/// in UTC, without a zone marker.
pub(crate) mod pd_timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }

    pub fn deserialize_opt<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw.as_deref() {
            None | Some("") => Ok(None),
            Some(s) => NaiveDateTime::parse_from_str(s, FORMAT)
                .map(|naive| Some(naive.and_utc()))
                .map_err(serde::de::Error::custom),
        }
    }
}
