use chrono::{DateTime, Utc};
use reqwest::Url;
use std::error::Error;
use std::time::Duration;

pub const SHEET_ID: &str = "12ePY5lSnYwHfNBpqFtUVjdNcOEL5j3KGq5fQIMZa68I";
pub const SHEET_TAB: &str = "Sheet1";
pub const EXPORT_BASE_URL: &str = "https://docs.google.com/spreadsheets/d";
pub const TIMEOUT_SECS: u64 = 10;

/// Link used when a row has no buy url.
pub const PLACEHOLDER_URL: &str = "#";
pub const CURRENCY_MARKER: &str = "$";
/// Filter control value meaning "no restriction".
pub const ALL_SENTINEL: &str = "All";

/// Where the comparison feed lives.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub sheet_id: String,
    pub sheet_tab: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        FeedConfig {
            sheet_id: SHEET_ID.to_string(),
            sheet_tab: SHEET_TAB.to_string(),
            base_url: EXPORT_BASE_URL.to_string(),
            timeout: Duration::from_secs(TIMEOUT_SECS),
        }
    }
}

impl FeedConfig {
    /// GViz JSON export url for the configured sheet and tab.
    pub fn export_url(&self) -> Result<Url, Box<dyn Error>> {
        let base = self.base_url.trim_end_matches('/');
        let url = format!("{base}/{}/gviz/tq", self.sheet_id);
        let parsed = Url::parse_with_params(&url, &[("tqx", "out:json"), ("sheet", self.sheet_tab.as_str())])
            .map_err(|e| format!("Invalid export url '{}': {}", url, e))?;
        Ok(parsed)
    }

    /// Export url with a `_cb` timestamp so intermediaries never serve a stale copy.
    pub fn cache_busted_url(&self, now: DateTime<Utc>) -> Result<Url, Box<dyn Error>> {
        let mut url = self.export_url()?;
        url.query_pairs_mut()
            .append_pair("_cb", &now.timestamp_millis().to_string());
        Ok(url)
    }
}
