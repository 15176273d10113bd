//! Job History Scraper
//!
//! Scrapes finished jobs from one or more MapReduce job-history servers,
//! enriches every job record, and bulk-writes the records to a search index
//! partitioned by the day each job finished. With checkpointing enabled a
//! run resumes each cluster from the newest finish time already indexed.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use jacko::testing::{job, MockHistorySource};
//! use jacko::{Cluster, ClusterDescriptor, IndexLayout, MemoryIndex, Orchestrator, RunMetrics, RunOptions};
//!
//! let source = MockHistorySource::new().with_job(job("job_1", 1_709_251_200_000));
//! let cluster = Cluster::new(ClusterDescriptor::new("prod", "rm-1", 19888), source);
//!
//! let store = Arc::new(MemoryIndex::new());
//! let orchestrator = Orchestrator::new(vec![cluster], store, IndexLayout::default(), RunOptions::default());
//!
//! let mut metrics = RunMetrics::new("localhost");
//! let report = orchestrator.run(&mut metrics).await?;
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Seams to history servers, index stores and enrichers
//! - [`pipeline`] - Checkpoint, directory, detail fetch, indexing and orchestration
//! - [`enrichers`] - Built-in enrichers and the enricher registry
//! - [`sources`] - History server implementation
//! - [`stores`] - Index store implementations
//! - [`metrics`] - Run metrics and the push gateway sink
//! - [`testing`] - Mock implementations for testing

pub mod cluster;
pub mod config;
pub mod enrichers;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod record;
pub mod sources;
pub mod stores;
pub mod testing;
pub mod traits;

pub use cluster::ClusterDescriptor;
pub use config::{Cli, Config};
pub use enrichers::{EnricherRegistry, EnrichmentChain};
pub use error::{ClusterError, ConfigError, RunError};
pub use metrics::RunMetrics;
pub use pipeline::{
    Cluster, IndexLayout, Orchestrator, RunOptions, RunReport, RunStatus, StartPolicy,
};
pub use record::JobRecord;
pub use sources::HistoryServerSource;
pub use stores::{ElasticsearchIndex, MemoryIndex};
pub use traits::{Enricher, HistorySource, IndexStore};
