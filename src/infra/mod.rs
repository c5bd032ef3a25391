// Infrastructure adapters: duplicate-id sources and file exports

pub mod export;
pub mod file_id_source;
pub mod sheets_client;

pub use export::{ExportFormat, Exporter};
pub use file_id_source::FileIdSource;
pub use sheets_client::SheetsIdSource;
