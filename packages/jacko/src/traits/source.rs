//! Job-history source trait.

use async_trait::async_trait;

use crate::error::{DetailError, DirectoryError};
use crate::record::JobRecord;

/// A job-history server for one cluster.
///
/// The detail fetcher clones the source once per worker, so a clone should
/// behave as an independent session against the same endpoint.
///
/// # Implementations
///
/// - `HistoryServerSource` - the MapReduce history server REST API
/// - `MockHistorySource` - scripted responses for tests
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Ids of the jobs that finished at or after `start_time` (epoch ms).
    ///
    /// A server that reports no jobs collection yields an empty list.
    async fn list_jobs(&self, start_time: i64) -> Result<Vec<String>, DirectoryError>;

    /// Full detail of one job.
    async fn fetch_job(&self, job_id: &str) -> Result<JobRecord, DetailError>;

    /// Human-readable endpoint, for logs.
    fn endpoint(&self) -> String;
}
