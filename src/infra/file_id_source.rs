use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use tracing::info;

use crate::app::ports::ExistingIdSource;
use crate::error::{Result, WsaError};
use crate::pipeline::ingestion::read_csv;
use crate::pipeline::processing::normalize::{clean_id, clean_string};

/// Existing ids kept in a local file: a CSV whose header names the id
/// column, or a plain list with one id per line.
pub struct FileIdSource {
    path: PathBuf,
    column: Option<String>,
}

impl FileIdSource {
    pub fn new(path: impl Into<PathBuf>, column: Option<String>) -> Self {
        Self {
            path: path.into(),
            column,
        }
    }
}

impl ExistingIdSource for FileIdSource {
    fn name(&self) -> &str {
        "file"
    }

    fn existing_ids(&self) -> Result<HashSet<String>> {
        let content = fs::read_to_string(&self.path).map_err(|e| {
            WsaError::Connection(format!("cannot read id file {}: {}", self.path.display(), e))
        })?;

        let is_csv = self
            .path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));

        let ids: HashSet<String> = if is_csv {
            let set = read_csv(content.as_bytes())?;
            let column = self
                .column
                .as_ref()
                .filter(|c| set.has_column(c))
                .or_else(|| set.columns.first())
                .cloned()
                .unwrap_or_default();
            set.column_values(&column)
                .map(clean_string)
                .filter(|id| !id.is_empty())
                .collect()
        } else {
            content
                .lines()
                .map(clean_id)
                .filter(|id| !id.is_empty())
                .collect()
        };

        info!("Loaded {} existing ids from {}", ids.len(), self.path.display());
        Ok(ids)
    }
}
