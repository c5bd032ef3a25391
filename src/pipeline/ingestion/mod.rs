// Pipeline ingestion: reading raw tables and the local id ledger

pub mod id_ledger;
pub mod reader;

pub use id_ledger::IdLedger;
pub use reader::{read_csv, read_json, read_path};
