//! Command line and environment configuration.

use chrono::Utc;
use clap::Parser;
use history_server_client::ClientOptions;
use std::collections::HashSet;
use std::time::Duration;

use crate::cluster::ClusterDescriptor;
use crate::enrichers::EnricherRegistry;
use crate::error::ConfigError;
use crate::pipeline::{IndexLayout, RunOptions, StartPolicy, DEFAULT_MAX_POOL_SIZE, DEFAULT_WINDOW_MS};

/// Scrape finished jobs from MapReduce history servers into a search index.
#[derive(Debug, Clone, Parser)]
#[command(name = "jacko", version)]
pub struct Cli {
    /// Only jobs finished at or after this time (epoch ms) [default: now - 10 min]
    #[arg(long = "time", env = "JACKO_START_TIME")]
    pub time: Option<i64>,

    /// Resume each cluster from the latest finishTime already indexed
    #[arg(short = 'g', long, env = "JACKO_CHECKPOINT")]
    pub get_latest_finish_time: bool,

    /// Search store host
    #[arg(short = 'e', long, env = "JACKO_ELASTICSEARCH")]
    pub elasticsearch: String,

    /// Index prefix; documents go to {prefix}-{YYYY-MM-DD}
    #[arg(short = 'i', long, env = "JACKO_INDEX", default_value = "jacko")]
    pub index: String,

    /// Document type, for stores that still use mapping types
    #[arg(short = 't', long = "type", env = "JACKO_TYPE")]
    pub doc_type: Option<String>,

    /// History server as host[:port][,name]
    #[arg(
        short = 'H',
        long = "history-server",
        env = "JACKO_HISTORY_SERVERS",
        value_delimiter = ';',
        required = true
    )]
    pub history_servers: Vec<String>,

    /// Prometheus push gateway host
    #[arg(short = 'p', long = "pushgateway", env = "JACKO_PUSHGATEWAYS", value_delimiter = ';')]
    pub pushgateways: Vec<String>,

    /// Maximum concurrent job detail requests per cluster
    #[arg(short = 'm', long, env = "JACKO_MAX_POOL_SIZE", default_value_t = DEFAULT_MAX_POOL_SIZE)]
    pub max_pool_size: usize,

    /// Enricher to apply after the cluster name, in order
    #[arg(short = 'n', long = "enricher", env = "JACKO_ENRICHERS", value_delimiter = ';')]
    pub enrichers: Vec<String>,

    /// Stop at the first cluster that fails
    #[arg(short = 'a', long, env = "JACKO_ABORT_ON_ERROR")]
    pub abort_on_error: bool,

    /// Scrape and enrich without writing to the search store
    #[arg(short = 's', long, env = "JACKO_SKIP_INDEXING")]
    pub skip_indexing: bool,

    /// Per-request timeout in seconds
    #[arg(long, env = "JACKO_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,

    #[arg(short = 'l', long, env = "JACKO_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Value of the `instance` metric label [default: this machine's host name]
    #[arg(long, env = "JACKO_INSTANCE")]
    pub instance: Option<String>,
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub start: StartPolicy,
    pub elasticsearch: String,
    pub index_prefix: String,
    pub doc_type: Option<String>,
    pub clusters: Vec<ClusterDescriptor>,
    pub pushgateways: Vec<String>,
    pub max_pool_size: usize,
    pub enrichers: Vec<String>,
    pub abort_on_error: bool,
    pub skip_indexing: bool,
    pub timeout: Duration,
    pub log_level: String,
    pub instance: String,
}

impl Config {
    pub fn from_cli(cli: Cli, registry: &EnricherRegistry) -> Result<Self, ConfigError> {
        if cli.max_pool_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max-pool-size",
                reason: "must be at least 1".to_string(),
            });
        }
        if cli.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "timeout-secs",
                reason: "must be at least 1".to_string(),
            });
        }
        if cli.index.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "index",
                reason: "must not be empty".to_string(),
            });
        }

        let clusters = parse_clusters(&cli.history_servers)?;

        for name in &cli.enrichers {
            if !registry.contains(name) {
                return Err(ConfigError::UnknownEnricher {
                    name: name.clone(),
                    known: registry.names().join(", "),
                });
            }
        }

        let explicit = cli
            .time
            .unwrap_or_else(|| Utc::now().timestamp_millis() - DEFAULT_WINDOW_MS);

        Ok(Self {
            start: StartPolicy::from_parts(explicit, cli.get_latest_finish_time),
            elasticsearch: cli.elasticsearch,
            index_prefix: cli.index,
            doc_type: cli.doc_type.filter(|t| !t.is_empty()),
            clusters,
            pushgateways: cli.pushgateways,
            max_pool_size: cli.max_pool_size,
            enrichers: cli.enrichers,
            abort_on_error: cli.abort_on_error,
            skip_indexing: cli.skip_indexing,
            timeout: Duration::from_secs(cli.timeout_secs),
            log_level: cli.log_level,
            instance: cli
                .instance
                .filter(|i| !i.is_empty())
                .unwrap_or_else(detect_hostname),
        })
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            start: self.start,
            max_concurrency: self.max_pool_size,
            abort_on_error: self.abort_on_error,
            skip_indexing: self.skip_indexing,
        }
    }

    pub fn layout(&self) -> IndexLayout {
        IndexLayout::new(self.index_prefix.clone())
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions::default().with_timeout(self.timeout)
    }
}

/// Host name of this machine, or `localhost` when it cannot be read.
fn detect_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

/// Parse cluster specs in command-line order. Names must be unique since
/// they key checkpoints and metrics.
fn parse_clusters(specs: &[String]) -> Result<Vec<ClusterDescriptor>, ConfigError> {
    let mut seen = HashSet::new();
    specs
        .iter()
        .enumerate()
        .map(|(idx, spec)| {
            let cluster = ClusterDescriptor::parse(spec, idx + 1)?;
            if !seen.insert(cluster.name.clone()) {
                return Err(ConfigError::DuplicateCluster(cluster.name));
            }
            Ok(cluster)
        })
        .collect()
}
