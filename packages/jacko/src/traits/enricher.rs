//! Record enricher trait.

use crate::error::EnrichmentError;
use crate::record::JobRecord;

/// Adds or rewrites fields on a job record.
///
/// Enrichers run sequentially on records owned by a single chain, so they
/// mutate in place. They must leave `id`, `finishTime` and `cluster` alone;
/// the chain checks this after every call.
pub trait Enricher: Send + Sync {
    /// Registry name, also used in error messages.
    fn name(&self) -> &str;

    fn enrich(&self, record: &mut JobRecord) -> Result<(), EnrichmentError>;
}
