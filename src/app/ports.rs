use std::collections::HashSet;

use tracing::info;

use crate::error::Result;
use crate::observability::metrics;

/// Somewhere the identifiers of already-delivered records can be read from.
/// A source that cannot be reached must fail with `WsaError::Connection`;
/// deduplication is never skipped silently.
pub trait ExistingIdSource {
    /// Short label used in logs
    fn name(&self) -> &str;

    fn existing_ids(&self) -> Result<HashSet<String>>;
}

/// An in-memory id set, used by callers that already hold the ids
impl ExistingIdSource for HashSet<String> {
    fn name(&self) -> &str {
        "in-memory"
    }

    fn existing_ids(&self) -> Result<HashSet<String>> {
        Ok(self.clone())
    }
}

/// Read a source's ids, recording the outcome in metrics
pub fn fetch_ids(source: &dyn ExistingIdSource) -> Result<HashSet<String>> {
    match source.existing_ids() {
        Ok(ids) => {
            metrics::id_source::fetch_success(source.name(), ids.len());
            info!("Fetched {} existing ids from {}", ids.len(), source.name());
            Ok(ids)
        }
        Err(e) => {
            metrics::id_source::fetch_error(source.name());
            Err(e)
        }
    }
}
