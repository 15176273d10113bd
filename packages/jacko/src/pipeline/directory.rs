//! Job directory listing for one cluster.

use std::collections::HashSet;
use tracing::{debug, info};

use crate::error::DirectoryError;
use crate::traits::HistorySource;

/// Lists the jobs a cluster finished since a start time.
pub struct JobDirectory<'a, S: ?Sized> {
    source: &'a S,
}

impl<'a, S: HistorySource + ?Sized> JobDirectory<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// Job ids finished at or after `start_time`, each listed once, in the
    /// order the server returned them.
    pub async fn list(&self, start_time: i64) -> Result<Vec<String>, DirectoryError> {
        debug!(endpoint = %self.source.endpoint(), start_time, "Listing jobs");
        let listed = self.source.list_jobs(start_time).await?;
        let total = listed.len();

        let mut seen = HashSet::with_capacity(total);
        let job_ids: Vec<String> = listed
            .into_iter()
            .filter(|id| !id.is_empty() && seen.insert(id.clone()))
            .collect();

        info!(
            endpoint = %self.source.endpoint(),
            count = job_ids.len(),
            skipped = total - job_ids.len(),
            "History server returned jobs"
        );
        Ok(job_ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{job, MockHistorySource};

    #[tokio::test]
    async fn test_lists_jobs_since_start_time() {
        let source = MockHistorySource::new()
            .with_job(job("job_1", 1_000))
            .with_job(job("job_2", 2_000))
            .with_job(job("job_3", 3_000));

        let ids = JobDirectory::new(&source).list(2_000).await.unwrap();

        assert_eq!(ids, vec!["job_2", "job_3"]);
        assert_eq!(source.listed_start_times(), vec![2_000]);
    }

    #[tokio::test]
    async fn test_duplicate_ids_listed_once() {
        let source = MockHistorySource::new().with_listing(vec!["job_1", "job_2", "job_1", ""]);

        let ids = JobDirectory::new(&source).list(0).await.unwrap();

        assert_eq!(ids, vec!["job_1", "job_2"]);
    }

    #[tokio::test]
    async fn test_empty_listing() {
        let source = MockHistorySource::new();

        assert!(JobDirectory::new(&source).list(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_listing_error_propagates() {
        let source = MockHistorySource::new().with_listing_error(404);

        let err = JobDirectory::new(&source).list(0).await.unwrap_err();

        assert!(matches!(err, DirectoryError::Status { status: 404, .. }));
    }
}
