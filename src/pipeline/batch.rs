//! Chunked runs of the processor over large inputs.
//!
//! Chunks run one after another to bound peak memory. Each chunk is a full,
//! independent pipeline run: the same `existing_ids` set is used for every
//! chunk, so two rows with the same id that land in different chunks of one
//! input are both kept. Only ids already in the external set are removed.

use std::collections::HashSet;

use tracing::{error, info, info_span};

use crate::error::{ChunkError, Result, WsaError};
use crate::observability::metrics;
use crate::pipeline::processor::{DataProcessor, ProcessingStats};
use crate::types::RecordSet;

pub struct BatchProcessor {
    processor: DataProcessor,
    batch_size: usize,
    sort_by: Option<String>,
    errors: Vec<ChunkError>,
    stats: ProcessingStats,
}

impl BatchProcessor {
    pub fn new(processor: DataProcessor, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(WsaError::Input("batch size must be at least 1".to_string()));
        }
        Ok(Self {
            processor,
            batch_size,
            sort_by: None,
            errors: Vec::new(),
            stats: ProcessingStats::default(),
        })
    }

    /// Sort column handed to every chunk's `finalize`
    pub fn with_sort_by(mut self, column: impl Into<String>) -> Self {
        self.sort_by = Some(column.into());
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Run every chunk and concatenate the successful outputs in chunk order.
    /// Errors and stats from an earlier call are cleared first.
    pub fn process_chunks(
        &mut self,
        data: &RecordSet,
        months: &[u32],
        existing_ids: &HashSet<String>,
    ) -> RecordSet {
        self.errors.clear();
        self.stats = ProcessingStats::default();

        let total_rows = data.len();
        let num_chunks = total_rows.div_ceil(self.batch_size);
        info!("Processing {} rows in {} chunks", total_rows, num_chunks);

        let mut combined: Option<RecordSet> = None;
        for i in 0..num_chunks {
            let _span = info_span!("chunk", index = i).entered();
            let start = i * self.batch_size;
            let end = (start + self.batch_size).min(total_rows);
            let chunk = data.slice(start, end);
            let rows = chunk.len();

            match self
                .processor
                .process_all(chunk, months, existing_ids, self.sort_by.as_deref())
            {
                Ok(output) => {
                    info!(
                        "Chunk {}/{} processed: {} rows",
                        i + 1,
                        num_chunks,
                        output.records.len()
                    );
                    metrics::batch::chunk_processed(rows);
                    self.stats.absorb(&output.stats);
                    match combined.as_mut() {
                        Some(all) => all.extend(output.records),
                        None => combined = Some(output.records),
                    }
                }
                Err(e) => {
                    error!("Error processing chunk {}/{}: {}", i + 1, num_chunks, e);
                    metrics::batch::chunk_failed();
                    self.errors.push(ChunkError {
                        chunk_index: i,
                        rows,
                        message: e.to_string(),
                    });
                }
            }
        }

        combined.unwrap_or_else(|| RecordSet::new(Vec::new()))
    }

    /// Failed chunks, in chunk order
    pub fn get_errors(&self) -> &[ChunkError] {
        &self.errors
    }

    /// Stats summed over the successful chunks of the last call
    pub fn get_stats(&self) -> &ProcessingStats {
        &self.stats
    }

    /// First chunk failure of the last call as an error
    pub fn ensure_no_errors(&self) -> Result<()> {
        match self.errors.first() {
            Some(first) => Err(WsaError::Chunk(first.clone())),
            None => Ok(()),
        }
    }
}
