pub mod analytics;
pub mod config;
pub mod constants;
pub mod error;
pub mod fingerprint;
pub mod logging;
pub mod observability;
pub mod pipeline;
pub mod types;

// Layered boundaries for application and infrastructure
pub mod app;
pub mod infra;

pub use analytics::{DataAnalyzer, MetricsCalculator, ReportGenerator};
pub use config::{AppConfig, ProcessorConfig};
pub use error::{ChunkError, Result, RowError, RowErrorKind, WsaError};
pub use pipeline::processing::quality_gate::{DataQualityChecker, QualityReport};
pub use pipeline::{BatchProcessor, DataProcessor, ProcessedOutput, ProcessingStats};
pub use types::{Mode, Record, RecordSet, Value};
