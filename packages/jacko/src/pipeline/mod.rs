//! The scrape-enrich-index pipeline.

pub mod checkpoint;
pub mod directory;
pub mod fetch;
pub mod index;
pub mod orchestrator;

pub use checkpoint::{CheckpointResolver, StartPolicy, DEFAULT_WINDOW_MS};
pub use directory::JobDirectory;
pub use fetch::DetailFetcher;
pub use index::{partition_date, BatchIndexer, IndexLayout, DEFAULT_PREFIX};
pub use orchestrator::{
    Cluster, ClusterSummary, Orchestrator, RunOptions, RunReport, RunStatus, ScrapeOutcome,
    DEFAULT_MAX_POOL_SIZE,
};
