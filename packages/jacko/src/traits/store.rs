//! Search index trait.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::pipeline::IndexLayout;
use crate::record::JobRecord;

/// One document of a bulk write.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDocument {
    /// Date partition (index name) the document goes to
    pub partition: String,
    /// Document id; an existing document with the same id is replaced
    pub id: String,
    pub record: JobRecord,
}

/// Storage backend for indexed job records.
///
/// # Implementations
///
/// - `ElasticsearchIndex` - Elasticsearch-compatible REST store
/// - `MemoryIndex` - in-process store for tests and dry runs
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Upsert all documents in one logical operation. Returns the number
    /// of documents the store accepted.
    async fn bulk_upsert(&self, docs: Vec<IndexDocument>) -> Result<usize, StoreError>;

    /// Largest `finishTime` among documents whose `cluster` is `cluster`,
    /// looking only at the date partitions `layout` owns.
    async fn max_finish_time(
        &self,
        layout: &IndexLayout,
        cluster: &str,
    ) -> Result<Option<i64>, StoreError>;

    /// Label identifying the store, for logs and metrics.
    fn describe(&self) -> String;
}
