//! Pure MapReduce job-history server REST client.
//!
//! Wraps the two read endpoints of the history server web service: the job
//! directory listing (filtered by finish time) and the per-job detail view.
//! Transient transport failures and gateway-style 5xx responses are retried
//! with capped exponential backoff; everything else is returned to the caller.
//!
//! # Example
//!
//! ```rust,ignore
//! use history_server_client::HistoryServerClient;
//!
//! let client = HistoryServerClient::new("resourcemanager-1", 19888)?;
//!
//! for summary in client.list_jobs(1_709_251_200_000).await? {
//!     let job = client.get_job(&summary.id).await?;
//!     println!("{} finished at {:?}", summary.id, job.get("finishTime"));
//! }
//! ```

pub mod error;
pub mod retry;
pub mod types;

pub use error::{HistoryServerError, Result};
pub use retry::RetryPolicy;
pub use types::{JobList, JobResponse, JobSummary, JobsResponse};

use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// Port the history server web service listens on unless told otherwise.
pub const DEFAULT_PORT: u16 = 19888;

const JOBS_PATH: &str = "ws/v1/history/mapreduce/jobs";

/// Transport settings for a [`HistoryServerClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Timeout applied to every individual request
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

impl ClientOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Client for one history server.
///
/// Cloning hands out another session on the same endpoint with the same
/// transport settings.
#[derive(Debug, Clone)]
pub struct HistoryServerClient {
    client: reqwest::Client,
    jobs_url: String,
    retry: RetryPolicy,
}

impl HistoryServerClient {
    /// Create a client with the default timeout and retry policy.
    pub fn new(host: &str, port: u16) -> Result<Self> {
        Self::with_options(host, port, ClientOptions::default())
    }

    pub fn with_options(host: &str, port: u16, options: ClientOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()?;

        Ok(Self {
            client,
            jobs_url: jobs_url(host, port),
            retry: options.retry,
        })
    }

    /// Base URL of the job directory endpoint.
    pub fn jobs_url(&self) -> &str {
        &self.jobs_url
    }

    /// List the jobs that finished at or after `finished_time_begin`
    /// (epoch milliseconds). A non-positive bound lists everything the
    /// server retains.
    pub async fn list_jobs(&self, finished_time_begin: i64) -> Result<Vec<JobSummary>> {
        let mut query = Vec::new();
        if finished_time_begin > 0 {
            query.push(("finishedTimeBegin", finished_time_begin.to_string()));
        }

        let body = self.get_with_retry(&self.jobs_url, &query).await?;
        let jobs = parse_jobs(&body)?;
        if jobs.is_none() {
            warn!(url = %self.jobs_url, "No jobs object returned");
        }
        let jobs = jobs.unwrap_or_default();
        debug!(url = %self.jobs_url, count = jobs.len(), "Listed jobs");
        Ok(jobs)
    }

    /// Fetch the full detail object of one job.
    pub async fn get_job(&self, job_id: &str) -> Result<Map<String, Value>> {
        let url = format!("{}/{}", self.jobs_url, job_id);
        let body = self.get_with_retry(&url, &[]).await?;
        parse_job(job_id, &body)
    }

    /// GET `url` and return the body of the first successful response,
    /// retrying whatever [`HistoryServerError::is_retryable`] allows.
    async fn get_with_retry(&self, url: &str, query: &[(&str, String)]) -> Result<String> {
        let mut retries = 0;
        loop {
            let err = match self.client.get(url).query(query).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(resp.text().await?),
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    let message = resp.text().await.unwrap_or_default();
                    HistoryServerError::Api { status, message }
                }
                Err(e) => HistoryServerError::Http(e),
            };

            if !err.is_retryable() || retries >= self.retry.max_retries {
                return Err(err);
            }

            retries += 1;
            let delay = self.retry.delay_for(retries);
            warn!(
                url = %url,
                error = %err,
                retry = retries,
                delay_ms = delay.as_millis() as u64,
                "Request failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// Build the job directory URL. A host that already carries a scheme is
/// used as-is.
fn jobs_url(host: &str, port: u16) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        format!("{}:{}/{}", host, port, JOBS_PATH)
    } else {
        format!("http://{}:{}/{}", host, port, JOBS_PATH)
    }
}

/// Decode a directory listing. `Ok(None)` means the server had no jobs
/// object at all.
pub fn parse_jobs(body: &str) -> Result<Option<Vec<JobSummary>>> {
    let response: JobsResponse = serde_json::from_str(body)?;
    Ok(response.jobs.map(|list| list.job))
}

/// Decode a job detail response.
pub fn parse_job(job_id: &str, body: &str) -> Result<Map<String, Value>> {
    let response: JobResponse = serde_json::from_str(body)?;
    response.job.ok_or_else(|| HistoryServerError::MissingJob {
        job_id: job_id.to_string(),
    })
}
