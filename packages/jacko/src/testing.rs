//! Testing utilities including mock implementations.
//!
//! These drive the pipeline without a history server or a search store.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::error::{DetailError, DirectoryError, EnrichmentError, StoreError};
use crate::pipeline::IndexLayout;
use crate::record::{JobRecord, FINISH_TIME, ID};
use crate::stores::MemoryIndex;
use crate::traits::{Enricher, HistorySource, IndexDocument, IndexStore};

/// A minimal job record with an id and a finish time.
pub fn job(id: &str, finish_time: i64) -> JobRecord {
    let mut record = JobRecord::new();
    record.insert(ID, id);
    record.insert(FINISH_TIME, finish_time);
    record
}

/// What the mock answers when a job's detail is requested.
#[derive(Debug, Clone)]
pub enum DetailBehavior {
    Record(JobRecord),
    ConnectionError,
    Status(u16),
    Malformed,
    Unexpected(String),
    Panic,
}

/// A scripted history server.
///
/// Clones share their script and call tracking, so a clone handed to the
/// pipeline can be inspected afterwards.
#[derive(Clone, Default)]
pub struct MockHistorySource {
    /// Listed jobs in order, with the finish time used for filtering
    entries: Arc<RwLock<Vec<(String, Option<i64>)>>>,

    /// Detail responses by job id
    details: Arc<RwLock<HashMap<String, DetailBehavior>>>,

    /// Fixed listing that ignores the start time
    listing: Arc<RwLock<Option<Vec<String>>>>,

    /// Status returned by every listing request
    listing_error: Arc<RwLock<Option<u16>>>,

    /// Latency of every detail request
    delay: Option<Duration>,

    /// Call tracking
    listed_start_times: Arc<RwLock<Vec<i64>>>,
    fetch_counts: Arc<RwLock<HashMap<String, usize>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockHistorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a job that is listed by finish time and fetched successfully.
    pub fn with_job(self, record: JobRecord) -> Self {
        let id = record.id().unwrap_or_default().to_string();
        self.entries
            .write()
            .unwrap()
            .push((id.clone(), record.finish_time()));
        self.details
            .write()
            .unwrap()
            .insert(id, DetailBehavior::Record(record));
        self
    }

    /// Add a job that is always listed and whose detail fetch behaves as given.
    pub fn with_failing_job(self, id: impl Into<String>, behavior: DetailBehavior) -> Self {
        let id = id.into();
        self.entries.write().unwrap().push((id.clone(), None));
        self.details.write().unwrap().insert(id, behavior);
        self
    }

    /// Return exactly these ids from every listing.
    pub fn with_listing(self, ids: Vec<&str>) -> Self {
        *self.listing.write().unwrap() = Some(ids.into_iter().map(String::from).collect());
        self
    }

    /// Fail every listing with an HTTP status.
    pub fn with_listing_error(self, status: u16) -> Self {
        *self.listing_error.write().unwrap() = Some(status);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Start times of every listing request, in order.
    pub fn listed_start_times(&self) -> Vec<i64> {
        self.listed_start_times.read().unwrap().clone()
    }

    pub fn fetch_count(&self, job_id: &str) -> usize {
        self.fetch_counts
            .read()
            .unwrap()
            .get(job_id)
            .copied()
            .unwrap_or(0)
    }

    /// Total detail requests made.
    pub fn total_fetches(&self) -> usize {
        self.fetch_counts.read().unwrap().values().sum()
    }

    /// Most detail requests that were ever running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HistorySource for MockHistorySource {
    async fn list_jobs(&self, start_time: i64) -> Result<Vec<String>, DirectoryError> {
        self.listed_start_times.write().unwrap().push(start_time);

        if let Some(status) = *self.listing_error.read().unwrap() {
            return Err(DirectoryError::Status {
                status,
                message: "Mock listing failure".to_string(),
            });
        }
        if let Some(listing) = self.listing.read().unwrap().clone() {
            return Ok(listing);
        }

        Ok(self
            .entries
            .read()
            .unwrap()
            .iter()
            .filter(|(_, finish)| finish.map_or(true, |f| f >= start_time))
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn fetch_job(&self, job_id: &str) -> Result<JobRecord, DetailError> {
        *self
            .fetch_counts
            .write()
            .unwrap()
            .entry(job_id.to_string())
            .or_default() += 1;

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let behavior = self.details.read().unwrap().get(job_id).cloned();
        match behavior {
            Some(DetailBehavior::Record(record)) => Ok(record),
            Some(DetailBehavior::ConnectionError) => Err(DetailError::Transport(Box::new(
                std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "Mock connection refused"),
            ))),
            Some(DetailBehavior::Status(status)) => Err(DetailError::Status {
                status,
                message: "Mock status".to_string(),
            }),
            Some(DetailBehavior::Malformed) => {
                Err(DetailError::Malformed("Mock malformed body".to_string()))
            }
            Some(DetailBehavior::Unexpected(reason)) => Err(DetailError::Unexpected(reason.into())),
            Some(DetailBehavior::Panic) => panic!("Mock panic fetching {}", job_id),
            None => Err(DetailError::Status {
                status: 404,
                message: format!("job {} not found", job_id),
            }),
        }
    }

    fn endpoint(&self) -> String {
        "mock://history-server".to_string()
    }
}

/// An index store whose queries or writes fail. The other operation is
/// served by an inner [`MemoryIndex`].
#[derive(Default)]
pub struct FailingIndex {
    inner: MemoryIndex,
    fail_queries: bool,
    fail_writes: bool,
}

impl FailingIndex {
    pub fn failing_queries() -> Self {
        Self {
            fail_queries: true,
            ..Default::default()
        }
    }

    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl IndexStore for FailingIndex {
    async fn bulk_upsert(&self, docs: Vec<IndexDocument>) -> Result<usize, StoreError> {
        if self.fail_writes {
            return Err(StoreError::new("Mock bulk write rejected"));
        }
        self.inner.bulk_upsert(docs).await
    }

    async fn max_finish_time(
        &self,
        layout: &IndexLayout,
        cluster: &str,
    ) -> Result<Option<i64>, StoreError> {
        if self.fail_queries {
            return Err(StoreError::new("Mock aggregation failed"));
        }
        self.inner.max_finish_time(layout, cluster).await
    }

    fn describe(&self) -> String {
        "failing".to_string()
    }
}

/// Fails on one job id, passes everything else through untouched.
pub struct FailingEnricher {
    job_id: String,
}

impl FailingEnricher {
    pub fn on_job(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
        }
    }
}

impl Enricher for FailingEnricher {
    fn name(&self) -> &str {
        "failing"
    }

    fn enrich(&self, record: &mut JobRecord) -> Result<(), EnrichmentError> {
        match record.id() {
            Some(id) if id == self.job_id => Err(EnrichmentError::Failed {
                enricher: self.name().to_string(),
                job_id: id.to_string(),
                reason: "Mock enrichment failure".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

/// Sets one field to a fixed value on every record.
pub struct SetFieldEnricher {
    name: String,
    field: String,
    value: Value,
}

impl SetFieldEnricher {
    pub fn new(name: impl Into<String>, field: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            field: field.into(),
            value,
        }
    }
}

impl Enricher for SetFieldEnricher {
    fn name(&self) -> &str {
        &self.name
    }

    fn enrich(&self, record: &mut JobRecord) -> Result<(), EnrichmentError> {
        record.insert(self.field.clone(), self.value.clone());
        Ok(())
    }
}
