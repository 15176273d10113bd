//! Date-partitioned bulk indexing.

use chrono::{DateTime, NaiveDate};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::error::IndexingError;
use crate::record::JobRecord;
use crate::traits::{IndexDocument, IndexStore};

/// Default index prefix.
pub const DEFAULT_PREFIX: &str = "jacko";

/// Naming of the date partitions under one prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexLayout {
    prefix: String,
}

impl Default for IndexLayout {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl IndexLayout {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Index expression covering every partition of this layout. Also
    /// covers indices of longer prefixes such as `{prefix}-staging-...`;
    /// narrow with [`partition_wildcard`](Self::partition_wildcard).
    pub fn pattern(&self) -> String {
        format!("{}-*", self.prefix)
    }

    /// `_index` wildcard matching only `{prefix}-YYYY-MM-DD` names.
    pub fn partition_wildcard(&self) -> String {
        format!("{}-????-??-??", self.prefix)
    }

    /// Whether `partition` is one of this layout's date partitions.
    pub fn owns(&self, partition: &str) -> bool {
        partition
            .strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_prefix('-'))
            .is_some_and(|date| {
                date.len() == 10 && NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok()
            })
    }

    /// Partition for a job that finished at `finish_time_ms`:
    /// `{prefix}-{YYYY-MM-DD}` of the UTC date. `None` when the timestamp
    /// is out of range.
    pub fn partition_for(&self, finish_time_ms: i64) -> Option<String> {
        partition_date(finish_time_ms).map(|date| format!("{}-{}", self.prefix, date))
    }
}

/// UTC calendar date (`YYYY-MM-DD`) of an epoch-millisecond timestamp.
pub fn partition_date(epoch_ms: i64) -> Option<String> {
    DateTime::from_timestamp_millis(epoch_ms).map(|t| t.format("%Y-%m-%d").to_string())
}

/// Writes a run's accumulated records in one bulk operation.
pub struct BatchIndexer<'a, I: ?Sized> {
    store: &'a I,
    layout: &'a IndexLayout,
}

impl<'a, I: IndexStore + ?Sized> BatchIndexer<'a, I> {
    pub fn new(store: &'a I, layout: &'a IndexLayout) -> Self {
        Self { store, layout }
    }

    /// Group records by target partition.
    ///
    /// Every record must carry an id and a finish time; one that does not
    /// fails the whole batch before anything is written.
    pub fn partition(
        &self,
        records: Vec<JobRecord>,
    ) -> Result<BTreeMap<String, Vec<JobRecord>>, IndexingError> {
        let mut partitions: BTreeMap<String, Vec<JobRecord>> = BTreeMap::new();
        for record in records {
            let job_id = record.id().ok_or(IndexingError::MissingId)?;
            let partition = record
                .finish_time()
                .and_then(|finish| self.layout.partition_for(finish))
                .ok_or_else(|| IndexingError::MissingFinishTime {
                    job_id: job_id.to_string(),
                })?;
            partitions.entry(partition).or_default().push(record);
        }
        Ok(partitions)
    }

    /// Upsert all records, keyed by job id. Re-indexing the same records
    /// leaves the store unchanged.
    pub async fn index(&self, records: Vec<JobRecord>) -> Result<usize, IndexingError> {
        if records.is_empty() {
            return Ok(0);
        }

        let partitions = self.partition(records)?;
        let mut docs = Vec::new();
        for (partition, records) in partitions {
            debug!(partition = %partition, count = records.len(), "Prepared partition");
            for record in records {
                let id = record.id().ok_or(IndexingError::MissingId)?.to_string();
                docs.push(IndexDocument {
                    partition: partition.clone(),
                    id,
                    record,
                });
            }
        }

        let submitted = docs.len();
        let indexed = self.store.bulk_upsert(docs).await?;
        info!(
            store = %self.store.describe(),
            submitted,
            indexed,
            "Indexed documents"
        );
        Ok(indexed)
    }
}
