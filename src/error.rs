use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WsaError {
    /// Missing or empty required input. Aborts the run.
    #[error("Input error: {0}")]
    Input(String),

    #[error("Row error: {0}")]
    Row(#[from] RowError),

    #[error("Chunk error: {0}")]
    Chunk(#[from] ChunkError),

    /// The duplicate-id source could not be reached.
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Excel export failed: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("Ledger error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid regex pattern: {0}")]
    Regex(#[from] regex::Error),

    #[error("Template rendering failed: {0}")]
    Template(#[from] askama::Error),
}

impl From<reqwest::Error> for WsaError {
    fn from(err: reqwest::Error) -> Self {
        WsaError::Connection(err.to_string())
    }
}

/// Why a single row was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowErrorKind {
    EmptyRow,
    InvalidPhone,
    MissingDate,
    InvalidDate,
}

/// A malformed row. Recorded in the stats, never fatal.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("row {row} ({kind:?}): {detail}")]
pub struct RowError {
    /// 0-based position of the row in the raw input
    pub row: usize,
    pub kind: RowErrorKind,
    pub detail: String,
}

impl RowError {
    pub fn new(row: usize, kind: RowErrorKind, detail: impl Into<String>) -> Self {
        Self {
            row,
            kind,
            detail: detail.into(),
        }
    }
}

/// A batch chunk whose pipeline run failed. Other chunks keep going.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("chunk {chunk_index} ({rows} rows): {message}")]
pub struct ChunkError {
    /// 0-based chunk position
    pub chunk_index: usize,
    pub rows: usize,
    pub message: String,
}

pub type Result<T> = std::result::Result<T, WsaError>;
