use std::collections::HashSet;

use tracing::{info, warn};

use crate::app::ports::{fetch_ids, ExistingIdSource};
use crate::config::QualityConfig;
use crate::error::{ChunkError, Result};
use crate::pipeline::batch::BatchProcessor;
use crate::pipeline::processing::normalize::clean_string;
use crate::pipeline::processing::quality_gate::{DataQualityChecker, QualityResult};
use crate::pipeline::processor::{DataProcessor, ProcessingStats};
use crate::types::RecordSet;

/// Per-run options for a processing request
#[derive(Debug, Clone, Default)]
pub struct ProcessRequest {
    pub months: Vec<u32>,
    /// Chunked run when set
    pub batch_size: Option<usize>,
    pub sort_by: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub records: RecordSet,
    pub stats: ProcessingStats,
    pub chunk_errors: Vec<ChunkError>,
    pub quality: QualityResult,
    /// Name of the id source used, if any
    pub id_source: Option<String>,
    pub existing_ids: usize,
}

impl ProcessOutcome {
    /// Cleaned, non-empty values of `column` in the output
    pub fn ids(&self, column: &str) -> Vec<String> {
        self.records
            .column_values(column)
            .map(clean_string)
            .filter(|id| !id.is_empty())
            .collect()
    }
}

/// One end-to-end run: read the known ids, clean the input (whole or in
/// chunks) and score the result.
pub struct ProcessUseCase<'a> {
    processor: DataProcessor,
    id_source: Option<&'a dyn ExistingIdSource>,
    quality: QualityConfig,
}

impl<'a> ProcessUseCase<'a> {
    pub fn new(processor: DataProcessor, quality: QualityConfig) -> Self {
        Self {
            processor,
            id_source: None,
            quality,
        }
    }

    pub fn with_id_source(mut self, source: &'a dyn ExistingIdSource) -> Self {
        self.id_source = Some(source);
        self
    }

    /// Fails on input errors and when the id source is unreachable. In a
    /// chunked run failed chunks are reported in the outcome instead.
    pub fn execute(&self, raw: RecordSet, request: &ProcessRequest) -> Result<ProcessOutcome> {
        let existing_ids = match self.id_source {
            Some(source) => fetch_ids(source)?,
            None => {
                warn!("No duplicate-id source configured, skipping external duplicate check");
                HashSet::new()
            }
        };

        let (records, stats, chunk_errors) = match request.batch_size {
            Some(batch_size) => {
                let mut batch = BatchProcessor::new(self.processor.fresh(), batch_size)?;
                if let Some(column) = &request.sort_by {
                    batch = batch.with_sort_by(column.clone());
                }
                let records = batch.process_chunks(&raw, &request.months, &existing_ids);
                (
                    records,
                    batch.get_stats().clone(),
                    batch.get_errors().to_vec(),
                )
            }
            None => {
                let output = self.processor.process_all(
                    raw,
                    &request.months,
                    &existing_ids,
                    request.sort_by.as_deref(),
                )?;
                (output.records, output.stats, Vec::new())
            }
        };

        let mut checker = DataQualityChecker::with_config(records, self.quality.clone());
        let quality = checker.run_all_checks().clone();
        info!(
            "Run finished: {} rows out, quality {}/100",
            stats.final_rows, quality.overall_score
        );

        Ok(ProcessOutcome {
            records: checker.records().clone(),
            stats,
            chunk_errors,
            quality,
            id_source: self.id_source.map(|s| s.name().to_string()),
            existing_ids: existing_ids.len(),
        })
    }
}
