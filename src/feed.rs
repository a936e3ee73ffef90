//! Spreadsheet feed loading.
//!
//! The GViz export wraps its JSON in a JavaScript callback
//! (`/*O_o*/ google.visualization.Query.setResponse({...});`), so the payload
//! is cut out between the first `{` and the last `}` before parsing. A failed
//! load is logged and turned into an empty row set; the table still renders.

use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::error::Error;
use tracing::{debug, error, info};

use crate::config::FeedConfig;
use crate::normalize::{format_number, normalize_all, ComparisonEntry, RawRow};

#[derive(Debug, Deserialize)]
pub struct GvizResponse {
    pub table: GvizTable,
}

#[derive(Debug, Deserialize)]
pub struct GvizTable {
    #[serde(default)]
    pub cols: Vec<GvizColumn>,
    #[serde(default)]
    pub rows: Vec<GvizRow>,
}

#[derive(Debug, Deserialize)]
pub struct GvizColumn {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

impl GvizColumn {
    fn header(&self) -> String {
        [self.label.as_deref(), self.id.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|s| !s.is_empty())
            .unwrap_or("")
            .to_string()
    }
}

#[derive(Debug, Deserialize)]
pub struct GvizRow {
    // Cells can be `null` when the sheet cell is blank.
    #[serde(default)]
    pub c: Vec<Option<GvizCell>>,
}

#[derive(Debug, Deserialize)]
pub struct GvizCell {
    #[serde(default)]
    pub v: Value,
}

/// Slice the JSON object out of the export envelope.
pub fn extract_payload(text: &str) -> Result<&str, Box<dyn Error>> {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => Ok(&text[start..=end]),
        _ => Err(format!("Malformed feed envelope ({} bytes, no JSON object found)", text.len()))?,
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n
            .as_f64()
            .map(format_number)
            .unwrap_or_else(|| n.to_string()),
        other => other.to_string(),
    }
}

impl GvizTable {
    pub fn into_raw_rows(self) -> Vec<RawRow> {
        let headers: Vec<String> = self.cols.iter().map(GvizColumn::header).collect();
        self.rows
            .into_iter()
            .map(|row| {
                let cells = row
                    .c
                    .iter()
                    .map(|cell| cell.as_ref().map(|c| cell_text(&c.v)).unwrap_or_default())
                    .collect();
                RawRow::from_cells(&headers, cells)
            })
            .collect()
    }
}

/// Parse a full export response body into raw rows.
pub fn parse_feed(text: &str) -> Result<Vec<RawRow>, Box<dyn Error>> {
    let payload = extract_payload(text)?;
    let gviz: GvizResponse = serde_json::from_str(payload)?;
    Ok(gviz.table.into_raw_rows())
}

pub async fn fetch_feed(client: &reqwest::Client, config: &FeedConfig) -> Result<String, Box<dyn Error>> {
    let url = config.cache_busted_url(Utc::now())?;
    debug!(%url, "requesting comparison feed");

    let resp = client.get(url).timeout(config.timeout).send().await?;

    let status = resp.status();
    let text = resp.text().await?;

    if !status.is_success() {
        Err(format!(
            "Feed request failed [CODE: {}]: {}",
            status, text
        ))?
    } else {
        Ok(text)
    }
}

/// One load attempt. Never fails: errors are logged and yield no rows.
pub async fn load_rows(client: &reqwest::Client, config: &FeedConfig) -> Vec<RawRow> {
    let result = match fetch_feed(client, config).await {
        Ok(text) => parse_feed(&text),
        Err(e) => Err(e),
    };
    match result {
        Ok(rows) => {
            info!(rows = rows.len(), sheet = %config.sheet_tab, "comparison feed loaded");
            rows
        }
        Err(e) => {
            error!(error = %e, "sheet load failed, continuing with an empty table");
            Vec::new()
        }
    }
}

pub async fn load_entries(client: &reqwest::Client, config: &FeedConfig) -> Vec<ComparisonEntry> {
    normalize_all(&load_rows(client, config).await)
}
