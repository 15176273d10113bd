//! Start-time resolution for a cluster's scrape.

use chrono::Utc;
use tracing::debug;

use crate::error::CheckpointError;
use crate::pipeline::index::IndexLayout;
use crate::traits::IndexStore;

/// Default look-back when no explicit start time is configured.
pub const DEFAULT_WINDOW_MS: i64 = 10 * 60 * 1000;

/// Where a cluster's scrape starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPolicy {
    /// A fixed lower bound on finish time, in epoch milliseconds
    Fixed(i64),
    /// Resume from the latest finish time already indexed for the cluster
    Checkpoint,
}

impl StartPolicy {
    /// Build from an explicit start time and the checkpoint flag; the flag wins.
    pub fn from_parts(explicit_start_time: i64, checkpoint_mode: bool) -> Self {
        if checkpoint_mode {
            Self::Checkpoint
        } else {
            Self::Fixed(explicit_start_time)
        }
    }

    /// Jobs that finished in the last ten minutes.
    pub fn recent() -> Self {
        Self::Fixed(Utc::now().timestamp_millis() - DEFAULT_WINDOW_MS)
    }
}

/// Reads checkpoints from the index store.
pub struct CheckpointResolver<'a, I: ?Sized> {
    store: &'a I,
    layout: &'a IndexLayout,
}

impl<'a, I: IndexStore + ?Sized> CheckpointResolver<'a, I> {
    pub fn new(store: &'a I, layout: &'a IndexLayout) -> Self {
        Self { store, layout }
    }

    /// Start time for `cluster_name` under `policy`.
    ///
    /// In checkpoint mode this is the newest `finishTime` indexed for the
    /// cluster, or 0 when nothing has been indexed yet. A failed query is
    /// returned as an error, never replaced by 0.
    pub async fn resolve(&self, cluster_name: &str, policy: StartPolicy) -> Result<i64, CheckpointError> {
        if let StartPolicy::Fixed(start_time) = policy {
            return Ok(start_time);
        }

        let latest = self
            .store
            .max_finish_time(self.layout, cluster_name)
            .await
            .map_err(|source| CheckpointError {
                cluster: cluster_name.to_string(),
                source,
            })?;

        let start_time = latest.unwrap_or(0);
        debug!(cluster = %cluster_name, start_time, "Resolved checkpoint");
        Ok(start_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MemoryIndex;
    use crate::testing::{job, FailingIndex};
    use crate::traits::IndexDocument;

    #[tokio::test]
    async fn test_fixed_policy_passes_through() {
        let store = MemoryIndex::new();
        let layout = IndexLayout::new("jacko");

        let start = CheckpointResolver::new(&store, &layout)
            .resolve("X", StartPolicy::Fixed(1234))
            .await
            .unwrap();

        assert_eq!(start, 1234);
    }

    #[tokio::test]
    async fn test_checkpoint_on_empty_store_is_zero() {
        let store = MemoryIndex::new();
        let layout = IndexLayout::new("jacko");

        let start = CheckpointResolver::new(&store, &layout)
            .resolve("X", StartPolicy::Checkpoint)
            .await
            .unwrap();

        assert_eq!(start, 0);
    }

    #[tokio::test]
    async fn test_checkpoint_is_per_cluster_max() {
        let store = MemoryIndex::new();
        let layout = IndexLayout::new("jacko");
        let docs = vec![
            ("job_1", "X", 1_000),
            ("job_2", "X", 3_000),
            ("job_3", "Y", 9_000),
        ]
        .into_iter()
        .map(|(id, cluster, finish)| {
            let mut record = job(id, finish);
            record.insert("cluster", cluster);
            IndexDocument {
                partition: layout.partition_for(finish).unwrap(),
                id: id.to_string(),
                record,
            }
        })
        .collect();
        store.bulk_upsert(docs).await.unwrap();

        let resolver = CheckpointResolver::new(&store, &layout);

        assert_eq!(resolver.resolve("X", StartPolicy::Checkpoint).await.unwrap(), 3_000);
        assert_eq!(resolver.resolve("Y", StartPolicy::Checkpoint).await.unwrap(), 9_000);
    }

    #[tokio::test]
    async fn test_checkpoint_ignores_longer_prefixes() {
        let store = MemoryIndex::new();
        let staging = IndexLayout::new("jacko-staging");
        let mut record = job("job_1", 9_000_000);
        record.insert("cluster", "X");
        store
            .bulk_upsert(vec![IndexDocument {
                partition: staging.partition_for(9_000_000).unwrap(),
                id: "job_1".to_string(),
                record,
            }])
            .await
            .unwrap();

        let layout = IndexLayout::new("jacko");
        let start = CheckpointResolver::new(&store, &layout)
            .resolve("X", StartPolicy::Checkpoint)
            .await
            .unwrap();

        assert_eq!(start, 0);
        let start = CheckpointResolver::new(&store, &staging)
            .resolve("X", StartPolicy::Checkpoint)
            .await
            .unwrap();
        assert_eq!(start, 9_000_000);
    }

    #[tokio::test]
    async fn test_query_failure_is_not_defaulted() {
        let store = FailingIndex::failing_queries();
        let layout = IndexLayout::new("jacko");

        let err = CheckpointResolver::new(&store, &layout)
            .resolve("X", StartPolicy::Checkpoint)
            .await
            .unwrap_err();

        assert_eq!(err.cluster, "X");
    }

    #[test]
    fn test_checkpoint_flag_overrides_explicit_time() {
        assert_eq!(StartPolicy::from_parts(5, true), StartPolicy::Checkpoint);
        assert_eq!(StartPolicy::from_parts(5, false), StartPolicy::Fixed(5));
    }
}
