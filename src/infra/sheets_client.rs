use reqwest::blocking::Client;
use reqwest::Url;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info};

use crate::app::ports::ExistingIdSource;
use crate::config::SheetsConfig;
use crate::error::{Result, WsaError};
use crate::pipeline::processing::normalize::clean_id;
use crate::types::Mode;

/// Body of a Sheets `values.get` response
#[derive(Debug, Deserialize)]
pub struct ValueRange {
    #[serde(default)]
    pub values: Vec<Vec<serde_json::Value>>,
}

/// Reads existing ids from the mode's worksheet through the Sheets values API
pub struct SheetsIdSource {
    client: Client,
    url: Url,
    id_column: Option<String>,
}

impl SheetsIdSource {
    /// `id_column` names the header to read; the first column is used when it
    /// is unset or absent from the sheet.
    pub fn new(config: &SheetsConfig, mode: Mode, api_key: &str, id_column: Option<String>) -> Result<Self> {
        if config.spreadsheet_id.trim().is_empty() {
            return Err(WsaError::Config("sheets.spreadsheet_id is not set".to_string()));
        }
        let url = values_url(config, config.worksheet_for(mode), api_key)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url,
            id_column,
        })
    }

    /// Reads the API key from the configured environment variable
    pub fn from_env(config: &SheetsConfig, mode: Mode, id_column: Option<String>) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            WsaError::Config(format!("environment variable {} is not set", config.api_key_env))
        })?;
        Self::new(config, mode, &api_key, id_column)
    }
}

impl ExistingIdSource for SheetsIdSource {
    fn name(&self) -> &str {
        "sheets"
    }

    fn existing_ids(&self) -> Result<HashSet<String>> {
        debug!("Fetching existing ids from {}", self.url.path());
        let resp = self.client.get(self.url.clone()).send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(WsaError::Connection(format!(
                "Sheets API returned {} for {}",
                status,
                self.url.path()
            )));
        }
        let range: ValueRange = resp.json()?;
        let ids = ids_from_value_range(&range, self.id_column.as_deref());
        info!("Found {} existing IDs", ids.len());
        Ok(ids)
    }
}

fn values_url(config: &SheetsConfig, worksheet: &str, api_key: &str) -> Result<Url> {
    let mut url = Url::parse(&config.base_url)
        .map_err(|e| WsaError::Config(format!("invalid sheets.base_url: {}", e)))?;
    url.path_segments_mut()
        .map_err(|_| WsaError::Config("sheets.base_url cannot be a base".to_string()))?
        .pop_if_empty()
        .extend(["v4", "spreadsheets", config.spreadsheet_id.as_str(), "values", worksheet]);
    url.query_pairs_mut().append_pair("key", api_key);
    Ok(url)
}

/// Cleaned ids of one column; the first row is the header
pub fn ids_from_value_range(range: &ValueRange, column: Option<&str>) -> HashSet<String> {
    let Some((header, rows)) = range.values.split_first() else {
        return HashSet::new();
    };
    let index = column
        .and_then(|c| header.iter().position(|h| cell_text(h).trim() == c))
        .unwrap_or(0);

    rows.iter()
        .filter_map(|row| row.get(index))
        .map(|cell| clean_id(&cell_text(cell)))
        .filter(|id| !id.is_empty())
        .collect()
}

fn cell_text(cell: &serde_json::Value) -> String {
    match cell {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}
