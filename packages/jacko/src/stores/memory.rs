//! In-memory index store for tests and dry runs.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use crate::error::StoreError;
use crate::pipeline::IndexLayout;
use crate::record::{JobRecord, CLUSTER};
use crate::traits::{IndexDocument, IndexStore};

/// Documents keyed by `(partition, id)`. Writing an existing key replaces it.
///
/// Data is lost when the store is dropped.
pub struct MemoryIndex {
    docs: RwLock<BTreeMap<(String, String), JobRecord>>,
    bulk_calls: AtomicUsize,
}

impl Default for MemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(BTreeMap::new()),
            bulk_calls: AtomicUsize::new(0),
        }
    }

    pub fn document_count(&self) -> usize {
        self.docs.read().unwrap().len()
    }

    /// Distinct partition names, sorted.
    pub fn partitions(&self) -> Vec<String> {
        let docs = self.docs.read().unwrap();
        let mut partitions: Vec<String> = docs.keys().map(|(p, _)| p.clone()).collect();
        partitions.dedup();
        partitions
    }

    pub fn get(&self, partition: &str, id: &str) -> Option<JobRecord> {
        self.docs
            .read()
            .unwrap()
            .get(&(partition.to_string(), id.to_string()))
            .cloned()
    }

    /// Number of bulk writes received.
    pub fn bulk_calls(&self) -> usize {
        self.bulk_calls.load(Ordering::SeqCst)
    }

    /// Every stored document, in `(partition, id)` order.
    pub fn documents(&self) -> Vec<JobRecord> {
        self.docs.read().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl IndexStore for MemoryIndex {
    async fn bulk_upsert(&self, docs: Vec<IndexDocument>) -> Result<usize, StoreError> {
        self.bulk_calls.fetch_add(1, Ordering::SeqCst);
        let count = docs.len();
        let mut store = self.docs.write().unwrap();
        for doc in docs {
            store.insert((doc.partition, doc.id), doc.record);
        }
        Ok(count)
    }

    async fn max_finish_time(
        &self,
        layout: &IndexLayout,
        cluster: &str,
    ) -> Result<Option<i64>, StoreError> {
        let docs = self.docs.read().unwrap();
        Ok(docs
            .iter()
            .filter(|((partition, _), _)| layout.owns(partition))
            .filter(|(_, record)| record.get(CLUSTER).and_then(|c| c.as_str()) == Some(cluster))
            .filter_map(|(_, record)| record.finish_time())
            .max())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::job;

    fn doc(partition: &str, id: &str, cluster: &str, finish: i64) -> IndexDocument {
        let mut record = job(id, finish);
        record.insert(CLUSTER, cluster);
        IndexDocument {
            partition: partition.to_string(),
            id: id.to_string(),
            record,
        }
    }

    #[tokio::test]
    async fn test_upsert_replaces_same_key() {
        let store = MemoryIndex::new();
        store
            .bulk_upsert(vec![doc("jacko-2024-03-01", "job_1", "X", 1)])
            .await
            .unwrap();
        store
            .bulk_upsert(vec![doc("jacko-2024-03-01", "job_1", "X", 2)])
            .await
            .unwrap();

        assert_eq!(store.document_count(), 1);
        assert_eq!(
            store.get("jacko-2024-03-01", "job_1").unwrap().finish_time(),
            Some(2)
        );
    }

    #[tokio::test]
    async fn test_max_finish_time_only_reads_owned_partitions() {
        let store = MemoryIndex::new();
        store
            .bulk_upsert(vec![
                doc("jacko-2024-03-01", "job_1", "X", 10),
                doc("other-2024-03-01", "job_2", "X", 99),
                doc("jacko-staging-2024-03-02", "job_3", "X", 500),
            ])
            .await
            .unwrap();

        let jacko = IndexLayout::new("jacko");
        assert_eq!(store.max_finish_time(&jacko, "X").await.unwrap(), Some(10));
        assert_eq!(store.max_finish_time(&jacko, "Y").await.unwrap(), None);
        assert_eq!(
            store.max_finish_time(&IndexLayout::new("other"), "X").await.unwrap(),
            Some(99)
        );
        assert_eq!(
            store
                .max_finish_time(&IndexLayout::new("jacko-staging"), "X")
                .await
                .unwrap(),
            Some(500)
        );
    }
}
