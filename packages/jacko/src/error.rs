//! Typed errors for the scrape pipeline.
//!
//! Each stage has its own error type so the orchestrator can decide, by
//! type, whether a failure stays with one job, one cluster, or ends the run.

use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Listing a cluster's finished jobs failed. Fatal to that cluster.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Connection or timeout that outlived the retry policy
    #[error("history server unreachable: {0}")]
    Transport(#[source] BoxError),

    #[error("history server answered HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("malformed job listing: {0}")]
    Malformed(String),
}

/// Fetching one job's detail failed.
#[derive(Debug, Error)]
pub enum DetailError {
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("malformed job detail: {0}")]
    Malformed(String),

    /// Anything a source did not anticipate
    #[error("unexpected failure: {0}")]
    Unexpected(#[source] BoxError),
}

impl DetailError {
    /// Whether this failure is confined to its own job.
    pub fn is_isolated(&self) -> bool {
        !matches!(self, Self::Unexpected(_))
    }
}

/// The detail batch for a cluster was aborted.
#[derive(Debug, Error)]
pub enum DetailFetchError {
    #[error("worker for {job_id} failed: {source}")]
    Worker {
        job_id: String,
        #[source]
        source: DetailError,
    },

    #[error("worker panicked: {0}")]
    WorkerPanicked(String),

    #[error("worker for {job_id} could not get a fetch permit: pool closed")]
    PoolClosed { job_id: String },
}

/// An enricher rejected a record. Fatal to that cluster's batch.
#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("enricher {enricher} failed on {job_id}: {reason}")]
    Failed {
        enricher: String,
        job_id: String,
        reason: String,
    },

    #[error("enricher {enricher} changed protected field {field} on {job_id}")]
    ProtectedField {
        enricher: String,
        field: String,
        job_id: String,
    },
}

/// Failure reported by an [`IndexStore`](crate::traits::store::IndexStore) backend.
#[derive(Debug, Error)]
#[error("index store error: {0}")]
pub struct StoreError(#[source] pub BoxError);

impl StoreError {
    pub fn new(err: impl Into<BoxError>) -> Self {
        Self(err.into())
    }
}

/// The checkpoint for a cluster could not be read. Fatal to the run.
#[derive(Debug, Error)]
#[error("checkpoint query for cluster {cluster} failed: {source}")]
pub struct CheckpointError {
    pub cluster: String,
    #[source]
    pub source: StoreError,
}

/// The final bulk write failed. Fatal to the run.
#[derive(Debug, Error)]
pub enum IndexingError {
    #[error("record without id reached the indexer")]
    MissingId,

    #[error("job {job_id} has no usable finishTime")]
    MissingFinishTime { job_id: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Anything that ends one cluster's scrape.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Detail(#[from] DetailFetchError),

    #[error(transparent)]
    Enrichment(#[from] EnrichmentError),
}

impl ClusterError {
    /// Label used for the `exception_type` metric dimension.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Checkpoint(_) => "CheckpointError",
            Self::Directory(_) => "DirectoryError",
            Self::Detail(_) => "DetailFetchError",
            Self::Enrichment(_) => "EnrichmentError",
        }
    }
}

/// Errors that end a run before it completes.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error("indexing failed: {0}")]
    Indexing(#[from] IndexingError),
}

/// Invalid command line or environment configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid history server spec {spec:?}: {reason}")]
    InvalidClusterSpec { spec: String, reason: String },

    #[error("duplicate cluster name {0:?}")]
    DuplicateCluster(String),

    #[error("unknown enricher {name:?} (known: {known})")]
    UnknownEnricher { name: String, known: String },

    #[error("invalid {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Pushing metrics to a gateway failed. Logged, never fatal.
#[derive(Debug, Error)]
pub enum PushError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gateway answered HTTP {status}: {message}")]
    Rejected { status: u16, message: String },
}
