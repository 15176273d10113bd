//! Jacko
//!
//! One scrape run: every configured history server in turn, then a single
//! bulk write to the search store, then a metrics push.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use jacko::config::{Cli, Config};
use jacko::metrics::{push_all, RunMetrics};
use jacko::{Cluster, ElasticsearchIndex, EnricherRegistry, HistoryServerSource, Orchestrator};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let registry = EnricherRegistry::builtin();
    let config = match Config::from_cli(cli, &registry) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::from(2);
        }
    };

    match run(config, &registry).await {
        Ok(code) => {
            tracing::info!("Jacko finished");
            ExitCode::from(code)
        }
        Err(e) => {
            tracing::error!("Run failed: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("{},reqwest=warn,hyper=warn,hyper_util=warn", level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

async fn run(config: Config, registry: &EnricherRegistry) -> Result<u8> {
    let store = ElasticsearchIndex::new(&config.elasticsearch, config.doc_type.clone(), config.timeout)
        .context("Failed to create search store client")?;

    let clusters = config
        .clusters
        .iter()
        .map(|descriptor| {
            let source = HistoryServerSource::connect(descriptor, config.client_options())
                .with_context(|| format!("Failed to create history server client for {}", descriptor))?;
            Ok(Cluster::new(descriptor.clone(), source))
        })
        .collect::<Result<Vec<_>>>()?;
    tracing::debug!(clusters = clusters.len(), "Initialized history server sources");

    let enrichers = registry.build_all(&config.enrichers)?;
    let orchestrator = Orchestrator::new(
        clusters,
        Arc::new(store),
        config.layout(),
        config.run_options(),
    )
    .with_enrichers(enrichers);

    let mut metrics = RunMetrics::new(config.instance.clone());
    let result = orchestrator.run(&mut metrics).await;

    if !config.pushgateways.is_empty() {
        metrics.inc_runs();
        push_all(&config.pushgateways, &metrics).await;
    }

    let report = result?;
    Ok(report.status.exit_code())
}
