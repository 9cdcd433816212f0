use serde::Deserialize;

use crate::error::IngestError;

/// One evaluation of a split treatment, as sent by the SDK webhook.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Impression {
    pub key: String,
    pub split: String,
    pub environment_id: String,
    pub environment_name: String,
    pub treatment: String,
    pub time: i64,
    pub label: String,
    pub split_version_number: i64,
    pub sdk: String,
    pub sdk_version: String,
}

/// Parses the whole batch or nothing. `[]` and `null` are reported as
/// `EmptyBatch` so callers can answer with a client error.
pub fn parse_impressions(text: &str) -> Result<Vec<Impression>, IngestError> {
    let impressions: Option<Vec<Impression>> = serde_json::from_str(text)?;
    match impressions {
        Some(impressions) if !impressions.is_empty() => Ok(impressions),
        _ => Err(IngestError::EmptyBatch),
    }
}
