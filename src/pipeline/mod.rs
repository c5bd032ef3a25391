// Data processing pipeline: ingestion, cleaning stages, and the chunked runner

pub mod batch;
pub mod ingestion;
pub mod processing;
pub mod processor;

pub use batch::BatchProcessor;
pub use processor::{DataProcessor, ProcessedOutput, ProcessingStats};
