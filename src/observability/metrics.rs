//! Metrics for the fulfillment pipeline
//!
//! Recording goes through the `metrics` facade. Without an installed recorder
//! every call is a no-op, so library users and tests pay nothing.

use std::fmt;
use std::net::SocketAddr;

use tracing::info;

use crate::error::{Result, WsaError};

/// Every metric name the crate emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Processor
    ProcessorRowsLoaded,
    ProcessorRowsDropped,
    ProcessorRowsFinalized,
    ProcessorRowErrors,
    ProcessorRunDuration,

    // Batch
    BatchChunksProcessed,
    BatchChunksFailed,
    BatchChunkSize,

    // Quality
    QualityScore,
    QualityIssuesDetected,
    QualityRowsFixed,

    // Duplicate-id sources
    IdSourceFetchSuccess,
    IdSourceFetchError,
    IdSourceIdsLoaded,

    // Export
    ExportFilesWritten,
    ExportRowsWritten,
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::ProcessorRowsLoaded => "wsa_processor_rows_loaded_total",
            MetricName::ProcessorRowsDropped => "wsa_processor_rows_dropped_total",
            MetricName::ProcessorRowsFinalized => "wsa_processor_rows_finalized_total",
            MetricName::ProcessorRowErrors => "wsa_processor_row_errors_total",
            MetricName::ProcessorRunDuration => "wsa_processor_run_duration_seconds",

            MetricName::BatchChunksProcessed => "wsa_batch_chunks_processed_total",
            MetricName::BatchChunksFailed => "wsa_batch_chunks_failed_total",
            MetricName::BatchChunkSize => "wsa_batch_chunk_size",

            MetricName::QualityScore => "wsa_quality_score",
            MetricName::QualityIssuesDetected => "wsa_quality_issues_detected_total",
            MetricName::QualityRowsFixed => "wsa_quality_rows_fixed_total",

            MetricName::IdSourceFetchSuccess => "wsa_id_source_fetch_success_total",
            MetricName::IdSourceFetchError => "wsa_id_source_fetch_error_total",
            MetricName::IdSourceIdsLoaded => "wsa_id_source_ids_loaded",

            MetricName::ExportFilesWritten => "wsa_export_files_written_total",
            MetricName::ExportRowsWritten => "wsa_export_rows_written_total",
        }
    }
}

/// Install the Prometheus recorder with an HTTP scrape endpoint on `port`
pub fn init_exporter(port: u16) -> Result<()> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| WsaError::Config(format!("Failed to install Prometheus exporter: {}", e)))?;
    info!("Prometheus exporter listening on {}", addr);
    Ok(())
}

// ============================================================================
// Processor Metrics
// ============================================================================

pub mod processor {
    use super::MetricName;

    pub fn rows_loaded(mode: &str, count: usize) {
        ::metrics::counter!(MetricName::ProcessorRowsLoaded.as_str(), "mode" => mode.to_string())
            .increment(count as u64);
    }

    /// Rows removed by one stage (`malformed`, `mode`, `month`, `duplicate`)
    pub fn rows_dropped(mode: &str, stage: &'static str, count: usize) {
        if count == 0 {
            return;
        }
        ::metrics::counter!(
            MetricName::ProcessorRowsDropped.as_str(),
            "mode" => mode.to_string(),
            "stage" => stage
        )
        .increment(count as u64);
    }

    pub fn rows_finalized(mode: &str, count: usize) {
        ::metrics::counter!(MetricName::ProcessorRowsFinalized.as_str(), "mode" => mode.to_string())
            .increment(count as u64);
    }

    pub fn row_error(kind: &str) {
        ::metrics::counter!(MetricName::ProcessorRowErrors.as_str(), "kind" => kind.to_string())
            .increment(1);
    }

    pub fn run_duration(secs: f64) {
        ::metrics::histogram!(MetricName::ProcessorRunDuration.as_str()).record(secs);
    }
}

// ============================================================================
// Batch Metrics
// ============================================================================

pub mod batch {
    use super::MetricName;

    pub fn chunk_processed(rows: usize) {
        ::metrics::counter!(MetricName::BatchChunksProcessed.as_str()).increment(1);
        ::metrics::histogram!(MetricName::BatchChunkSize.as_str()).record(rows as f64);
    }

    pub fn chunk_failed() {
        ::metrics::counter!(MetricName::BatchChunksFailed.as_str()).increment(1);
    }
}

// ============================================================================
// Quality Metrics
// ============================================================================

pub mod quality {
    use super::MetricName;

    pub fn score_recorded(score: f64) {
        ::metrics::histogram!(MetricName::QualityScore.as_str()).record(score);
    }

    pub fn issue_detected(issue_type: &str, severity: &str) {
        ::metrics::counter!(
            MetricName::QualityIssuesDetected.as_str(),
            "issue_type" => issue_type.to_string(),
            "severity" => severity.to_string()
        )
        .increment(1);
    }

    pub fn rows_fixed(removed_duplicates: usize) {
        ::metrics::counter!(MetricName::QualityRowsFixed.as_str()).increment(removed_duplicates as u64);
    }
}

// ============================================================================
// Duplicate-id Source Metrics
// ============================================================================

pub mod id_source {
    use super::MetricName;

    pub fn fetch_success(source: &str, ids: usize) {
        ::metrics::counter!(MetricName::IdSourceFetchSuccess.as_str(), "source" => source.to_string())
            .increment(1);
        ::metrics::gauge!(MetricName::IdSourceIdsLoaded.as_str(), "source" => source.to_string())
            .set(ids as f64);
    }

    pub fn fetch_error(source: &str) {
        ::metrics::counter!(MetricName::IdSourceFetchError.as_str(), "source" => source.to_string())
            .increment(1);
    }
}

// ============================================================================
// Export Metrics
// ============================================================================

pub mod export {
    use super::MetricName;

    pub fn file_written(format: &str, rows: usize) {
        ::metrics::counter!(MetricName::ExportFilesWritten.as_str(), "format" => format.to_string())
            .increment(1);
        ::metrics::counter!(MetricName::ExportRowsWritten.as_str(), "format" => format.to_string())
            .increment(rows as u64);
    }
}
