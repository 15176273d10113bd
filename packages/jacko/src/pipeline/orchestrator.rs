//! Run orchestration.
//!
//! Clusters are scraped one after another. Each cluster's checkpoint,
//! directory, details and enrichment stages produce a single
//! [`ScrapeOutcome`]; a failed outcome discards that cluster's records and
//! the run moves on (or stops, with `abort_on_error`). Records from every
//! successful cluster are then written with exactly one indexing call.

use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, info_span, instrument, Instrument};
use uuid::Uuid;

use crate::cluster::ClusterDescriptor;
use crate::enrichers::EnrichmentChain;
use crate::error::{ClusterError, RunError};
use crate::metrics::RunMetrics;
use crate::pipeline::checkpoint::{CheckpointResolver, StartPolicy};
use crate::pipeline::directory::JobDirectory;
use crate::pipeline::fetch::DetailFetcher;
use crate::pipeline::index::{BatchIndexer, IndexLayout};
use crate::record::JobRecord;
use crate::traits::{Enricher, HistorySource, IndexStore};

/// Default upper bound on concurrent detail fetches per cluster.
pub const DEFAULT_MAX_POOL_SIZE: usize = 16;

/// A configured cluster and the source that serves it.
#[derive(Clone)]
pub struct Cluster<S> {
    pub descriptor: ClusterDescriptor,
    pub source: S,
}

impl<S> Cluster<S> {
    pub fn new(descriptor: ClusterDescriptor, source: S) -> Self {
        Self { descriptor, source }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub start: StartPolicy,
    pub max_concurrency: usize,
    /// Stop at the first failed cluster
    pub abort_on_error: bool,
    /// Scrape and enrich, but write nothing
    pub skip_indexing: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            start: StartPolicy::recent(),
            max_concurrency: DEFAULT_MAX_POOL_SIZE,
            abort_on_error: false,
            skip_indexing: false,
        }
    }
}

/// Result of scraping one cluster.
#[derive(Debug)]
pub struct ScrapeOutcome {
    pub cluster_name: String,
    /// Start time the directory was listed from, once resolved
    pub start_time: Option<i64>,
    pub result: Result<Vec<JobRecord>, ClusterError>,
}

impl ScrapeOutcome {
    pub fn failed(&self) -> bool {
        self.result.is_err()
    }

    pub fn error_kind(&self) -> Option<&'static str> {
        self.result.as_ref().err().map(ClusterError::kind)
    }
}

/// Per-cluster line of a [`RunReport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSummary {
    pub name: String,
    pub start_time: Option<i64>,
    pub jobs: usize,
    pub error_kind: Option<&'static str>,
}

impl From<&ScrapeOutcome> for ClusterSummary {
    fn from(outcome: &ScrapeOutcome) -> Self {
        Self {
            name: outcome.cluster_name.clone(),
            start_time: outcome.start_time,
            jobs: outcome.result.as_ref().map_or(0, Vec::len),
            error_kind: outcome.error_kind(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    CompletedFully,
    CompletedWithClusterErrors,
    /// `abort_on_error` stopped the run at this cluster
    AbortedEarly { cluster: String },
}

impl RunStatus {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::CompletedFully | Self::CompletedWithClusterErrors => 0,
            Self::AbortedEarly { .. } => 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub outcomes: Vec<ClusterSummary>,
    /// Records accumulated from successful clusters
    pub jobs_scraped: usize,
    pub docs_indexed: usize,
}

pub struct Orchestrator<S, I: ?Sized> {
    clusters: Vec<Cluster<S>>,
    store: Arc<I>,
    layout: IndexLayout,
    enrichers: Vec<Arc<dyn Enricher>>,
    options: RunOptions,
}

impl<S, I> Orchestrator<S, I>
where
    S: HistorySource + Clone + 'static,
    I: IndexStore + ?Sized,
{
    pub fn new(
        clusters: Vec<Cluster<S>>,
        store: Arc<I>,
        layout: IndexLayout,
        options: RunOptions,
    ) -> Self {
        Self {
            clusters,
            store,
            layout,
            enrichers: Vec::new(),
            options,
        }
    }

    /// External enrichers, applied after the cluster-name enricher in this order.
    pub fn with_enrichers(mut self, enrichers: Vec<Arc<dyn Enricher>>) -> Self {
        self.enrichers = enrichers;
        self
    }

    /// Scrape every cluster, then index what was collected.
    ///
    /// Cluster failures are reported in the returned [`RunReport`]. A
    /// checkpoint or indexing failure ends the run with an error.
    pub async fn run(&self, metrics: &mut RunMetrics) -> Result<RunReport, RunError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", run_id = %run_id);
        self.run_clusters(run_id, metrics).instrument(span).await
    }

    async fn run_clusters(
        &self,
        run_id: Uuid,
        metrics: &mut RunMetrics,
    ) -> Result<RunReport, RunError> {
        info!(clusters = self.clusters.len(), "Starting scrape run");

        let mut accumulated = Vec::new();
        let mut outcomes = Vec::with_capacity(self.clusters.len());
        let mut had_errors = false;
        let mut aborted_at = None;

        for cluster in &self.clusters {
            let outcome = self.scrape_cluster(cluster, metrics).await;
            outcomes.push(ClusterSummary::from(&outcome));

            match outcome.result {
                Ok(records) => accumulated.extend(records),
                Err(err) => {
                    error!(
                        cluster = %outcome.cluster_name,
                        kind = err.kind(),
                        error = %err,
                        "Failed to process cluster"
                    );
                    metrics.inc_scrape_error(&outcome.cluster_name, err.kind());
                    had_errors = true;

                    if let ClusterError::Checkpoint(e) = err {
                        return Err(RunError::Checkpoint(e));
                    }
                    if self.options.abort_on_error {
                        error!(cluster = %outcome.cluster_name, "Aborting run");
                        aborted_at = Some(outcome.cluster_name);
                        break;
                    }
                }
            }
        }

        let jobs_scraped = accumulated.len();
        info!(count = jobs_scraped, "Scraped jobs");
        let docs_indexed = self.index_all(accumulated, metrics).await?;

        let status = match aborted_at {
            Some(cluster) => RunStatus::AbortedEarly { cluster },
            None if had_errors => RunStatus::CompletedWithClusterErrors,
            None => RunStatus::CompletedFully,
        };
        info!(?status, jobs_scraped, docs_indexed, "Run finished");

        Ok(RunReport {
            run_id,
            status,
            outcomes,
            jobs_scraped,
            docs_indexed,
        })
    }

    /// Checkpoint, directory, details and enrichment for one cluster.
    #[instrument(skip_all, fields(cluster = %cluster.name()))]
    async fn scrape_cluster(&self, cluster: &Cluster<S>, metrics: &mut RunMetrics) -> ScrapeOutcome {
        let name = cluster.name();
        let started = Instant::now();

        let resolved = CheckpointResolver::new(self.store.as_ref(), &self.layout)
            .resolve(name, self.options.start)
            .await;
        let (start_time, scraped) = match resolved {
            Ok(start_time) => (Some(start_time), self.fetch_jobs(cluster, start_time).await),
            Err(e) => (None, Err(e.into())),
        };
        metrics.observe_scrape_time(name, started.elapsed());

        let result = scraped.and_then(|mut records| {
            metrics.inc_jobs_scraped(name, records.len() as u64);
            EnrichmentChain::for_cluster(name, &self.enrichers).apply_all(&mut records)?;
            Ok(records)
        });

        ScrapeOutcome {
            cluster_name: name.to_string(),
            start_time,
            result,
        }
    }

    async fn fetch_jobs(
        &self,
        cluster: &Cluster<S>,
        start_time: i64,
    ) -> Result<Vec<JobRecord>, ClusterError> {
        info!(start_time, "Scraping cluster");
        let job_ids = JobDirectory::new(&cluster.source).list(start_time).await?;
        let records = DetailFetcher::new(cluster.source.clone(), self.options.max_concurrency)
            .fetch_all(job_ids)
            .await?;
        Ok(records)
    }

    async fn index_all(
        &self,
        records: Vec<JobRecord>,
        metrics: &mut RunMetrics,
    ) -> Result<usize, RunError> {
        if records.is_empty() {
            return Ok(0);
        }
        if self.options.skip_indexing {
            info!(count = records.len(), "Skipping indexing");
            return Ok(0);
        }

        let store = self.store.describe();
        info!(store = %store, prefix = %self.layout.prefix(), count = records.len(), "Indexing jobs");

        let started = Instant::now();
        let result = BatchIndexer::new(self.store.as_ref(), &self.layout)
            .index(records)
            .await;
        metrics.observe_index_time(&store, started.elapsed());

        let indexed = result?;
        metrics.inc_docs_indexed(&store, indexed as u64);
        Ok(indexed)
    }
}
