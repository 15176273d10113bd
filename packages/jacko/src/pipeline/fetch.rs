//! Concurrent job detail fetching.
//!
//! Every job id is fetched exactly once by its own task; a semaphore sized
//! `min(max_concurrency, job count)` bounds how many run at a time. Each
//! task owns a clone of the source (its own session) and returns its record
//! by value, so nothing is shared between tasks and the caller assembles
//! the results after the pool drains.
//!
//! Failures the source reports as isolated (transport, status, malformed
//! body) turn into a sentinel record and are dropped; the rest of the batch
//! carries on. An unexpected failure or a panicking task aborts the batch.

use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::error::DetailFetchError;
use crate::record::JobRecord;
use crate::traits::HistorySource;

pub struct DetailFetcher<S> {
    source: S,
    max_concurrency: usize,
}

impl<S> DetailFetcher<S>
where
    S: HistorySource + Clone + 'static,
{
    pub fn new(source: S, max_concurrency: usize) -> Self {
        Self {
            source,
            max_concurrency,
        }
    }

    /// Number of fetches allowed in flight for a batch of `jobs` ids.
    pub fn pool_size(&self, jobs: usize) -> usize {
        self.max_concurrency.max(1).min(jobs)
    }

    /// Fetch every job in `job_ids`. The returned records all carry an id;
    /// their order is unspecified.
    pub async fn fetch_all(&self, job_ids: Vec<String>) -> Result<Vec<JobRecord>, DetailFetchError> {
        if job_ids.is_empty() {
            return Ok(Vec::new());
        }

        let requested = job_ids.len();
        let pool_size = self.pool_size(requested);
        debug!(
            endpoint = %self.source.endpoint(),
            jobs = requested,
            pool_size,
            "Fetching individual jobs"
        );

        let semaphore = Arc::new(Semaphore::new(pool_size));
        let handles: Vec<_> = job_ids
            .into_iter()
            .map(|job_id| {
                let session = self.source.clone();
                let permits = semaphore.clone();
                tokio::spawn(async move { fetch_with_permit(&session, permits, job_id).await })
            })
            .collect();

        let mut records = Vec::with_capacity(requested);
        let mut failure = None;
        for joined in join_all(handles).await {
            match joined {
                Ok(Ok(record)) if record.is_valid() => records.push(record),
                Ok(Ok(_sentinel)) => {}
                Ok(Err(e)) => {
                    failure.get_or_insert(e);
                }
                Err(e) => {
                    failure.get_or_insert(DetailFetchError::WorkerPanicked(e.to_string()));
                }
            }
        }
        if let Some(e) = failure {
            return Err(e);
        }

        info!(
            endpoint = %self.source.endpoint(),
            requested,
            fetched = records.len(),
            skipped = requested - records.len(),
            "Fetched job details"
        );
        Ok(records)
    }
}

/// Wait for a pool slot, then fetch. A closed pool is an error, never a
/// fetch without a permit.
async fn fetch_with_permit<S: HistorySource>(
    source: &S,
    permits: Arc<Semaphore>,
    job_id: String,
) -> Result<JobRecord, DetailFetchError> {
    let Ok(_permit) = permits.acquire_owned().await else {
        return Err(DetailFetchError::PoolClosed { job_id });
    };
    fetch_one(source, job_id).await
}

/// Fetch one job and stamp it with the time its fetch completed.
async fn fetch_one<S: HistorySource>(source: &S, job_id: String) -> Result<JobRecord, DetailFetchError> {
    match source.fetch_job(&job_id).await {
        Ok(mut record) => {
            if !record.is_valid() {
                warn!(job_id = %job_id, "Job detail without id, skipping");
                return Ok(JobRecord::sentinel());
            }
            record.stamp_fetched_at(Utc::now());
            Ok(record)
        }
        Err(e) if e.is_isolated() => {
            warn!(job_id = %job_id, error = %e, "Failed to fetch job, skipping");
            Ok(JobRecord::sentinel())
        }
        Err(source) => Err(DetailFetchError::Worker { job_id, source }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{job, DetailBehavior, MockHistorySource};
    use chrono::SubsecRound;
    use std::time::Duration;

    fn ids(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_connection_error_is_isolated() {
        let source = MockHistorySource::new()
            .with_job(job("job_1", 1_000))
            .with_failing_job("job_2", DetailBehavior::ConnectionError)
            .with_job(job("job_3", 3_000));
        let batch_start = Utc::now().trunc_subsecs(6);

        let records = DetailFetcher::new(source, 2)
            .fetch_all(ids(&["job_1", "job_2", "job_3"]))
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        for record in &records {
            assert!(record.id().is_some());
            assert!(record.fetched_at().unwrap() >= batch_start);
        }
    }

    #[tokio::test]
    async fn test_status_and_malformed_are_isolated() {
        let source = MockHistorySource::new()
            .with_job(job("job_1", 1_000))
            .with_failing_job("job_2", DetailBehavior::Status(500))
            .with_failing_job("job_3", DetailBehavior::Malformed)
            .with_failing_job("job_4", DetailBehavior::Record(JobRecord::new()));

        let records = DetailFetcher::new(source, 4)
            .fetch_all(ids(&["job_1", "job_2", "job_3", "job_4"]))
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id(), Some("job_1"));
    }

    #[tokio::test]
    async fn test_every_id_attempted_once() {
        let source = MockHistorySource::new()
            .with_job(job("job_1", 1_000))
            .with_job(job("job_2", 2_000))
            .with_failing_job("job_3", DetailBehavior::ConnectionError);

        DetailFetcher::new(source.clone(), 8)
            .fetch_all(ids(&["job_1", "job_2", "job_3"]))
            .await
            .unwrap();

        for id in ["job_1", "job_2", "job_3"] {
            assert_eq!(source.fetch_count(id), 1, "{id}");
        }
    }

    #[tokio::test]
    async fn test_parallelism_is_bounded() {
        let mut source = MockHistorySource::new().with_delay(Duration::from_millis(20));
        let mut job_ids = Vec::new();
        for n in 0..12 {
            let id = format!("job_{}", n);
            source = source.with_job(job(&id, n));
            job_ids.push(id);
        }

        let records = DetailFetcher::new(source.clone(), 3)
            .fetch_all(job_ids)
            .await
            .unwrap();

        assert_eq!(records.len(), 12);
        assert!(source.max_in_flight() <= 3);
        assert!(source.max_in_flight() >= 1);
    }

    #[test]
    fn test_pool_size() {
        let fetcher = DetailFetcher::new(MockHistorySource::new(), 16);
        assert_eq!(fetcher.pool_size(3), 3);
        assert_eq!(fetcher.pool_size(40), 16);

        let fetcher = DetailFetcher::new(MockHistorySource::new(), 0);
        assert_eq!(fetcher.pool_size(5), 1);
    }

    #[tokio::test]
    async fn test_unexpected_failure_aborts_batch() {
        let source = MockHistorySource::new()
            .with_job(job("job_1", 1_000))
            .with_failing_job("job_2", DetailBehavior::Unexpected("bad state".into()));

        let err = DetailFetcher::new(source, 2)
            .fetch_all(ids(&["job_1", "job_2"]))
            .await
            .unwrap_err();

        assert!(matches!(err, DetailFetchError::Worker { job_id, .. } if job_id == "job_2"));
    }

    #[tokio::test]
    async fn test_worker_panic_aborts_batch() {
        let source = MockHistorySource::new()
            .with_job(job("job_1", 1_000))
            .with_failing_job("job_2", DetailBehavior::Panic);

        let err = DetailFetcher::new(source, 2)
            .fetch_all(ids(&["job_1", "job_2"]))
            .await
            .unwrap_err();

        assert!(matches!(err, DetailFetchError::WorkerPanicked(_)));
    }

    #[tokio::test]
    async fn test_closed_pool_fails_without_fetching() {
        let source = MockHistorySource::new().with_job(job("job_1", 1_000));
        let permits = Arc::new(Semaphore::new(1));
        permits.close();

        let err = fetch_with_permit(&source, permits, "job_1".to_string())
            .await
            .unwrap_err();

        assert!(matches!(err, DetailFetchError::PoolClosed { job_id } if job_id == "job_1"));
        assert_eq!(source.fetch_count("job_1"), 0);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let records = DetailFetcher::new(MockHistorySource::new(), 4)
            .fetch_all(Vec::new())
            .await
            .unwrap();

        assert!(records.is_empty());
    }
}
