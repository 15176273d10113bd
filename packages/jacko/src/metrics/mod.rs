//! Per-run metrics.
//!
//! Samples are recorded through the `metrics` facade into a Prometheus
//! recorder owned by one [`RunMetrics`], so each run (and each test) has its
//! own registry instead of a process-global one. The recorder's handle
//! renders the text exposition format pushed to the gateway.

mod push;

pub use push::{push_all, PushGateway, PUSH_JOB, PUSH_TIMEOUT};

use ::metrics::{counter, describe_counter, describe_histogram, histogram, with_local_recorder};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use std::fmt;
use std::time::Duration;

const JOBS_SCRAPED: &str = "jobs_scraped_total";
const SCRAPE_ERRORS: &str = "scrape_errors_total";
const SCRAPE_TIME: &str = "scrape_time_seconds";
const DOCS_INDEXED: &str = "docs_indexed_total";
const INDEX_TIME: &str = "index_time_seconds";
const RUNS: &str = "jacko_runs_total";

/// Count and total of observed durations.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Summary {
    pub count: u64,
    pub sum: f64,
}

/// Counters and summaries for one run, labelled by the host running it.
pub struct RunMetrics {
    instance: String,
    recorder: PrometheusRecorder,
    handle: PrometheusHandle,
}

impl fmt::Debug for RunMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunMetrics")
            .field("instance", &self.instance)
            .finish_non_exhaustive()
    }
}

impl RunMetrics {
    pub fn new(instance: impl Into<String>) -> Self {
        let instance = instance.into();
        let recorder = PrometheusBuilder::new()
            .add_global_label("instance", instance.clone())
            .build_recorder();
        let handle = recorder.handle();

        with_local_recorder(&recorder, || {
            describe_counter!(JOBS_SCRAPED, "Jobs fetched from history servers");
            describe_counter!(SCRAPE_ERRORS, "Cluster scrapes that failed");
            describe_histogram!(SCRAPE_TIME, "Time spent scraping one cluster");
            describe_counter!(DOCS_INDEXED, "Documents written to the search store");
            describe_histogram!(INDEX_TIME, "Time spent in the bulk write");
            describe_counter!(RUNS, "Scrape runs");
        });

        Self {
            instance,
            recorder,
            handle,
        }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn inc_jobs_scraped(&mut self, cluster: &str, count: u64) {
        with_local_recorder(&self.recorder, || {
            counter!(JOBS_SCRAPED, "cluster_name" => cluster.to_string()).increment(count);
        });
    }

    pub fn inc_scrape_error(&mut self, cluster: &str, kind: &str) {
        with_local_recorder(&self.recorder, || {
            counter!(
                SCRAPE_ERRORS,
                "cluster_name" => cluster.to_string(),
                "exception_type" => kind.to_string()
            )
            .increment(1);
        });
    }

    pub fn observe_scrape_time(&mut self, cluster: &str, elapsed: Duration) {
        with_local_recorder(&self.recorder, || {
            histogram!(SCRAPE_TIME, "cluster_name" => cluster.to_string())
                .record(elapsed.as_secs_f64());
        });
    }

    pub fn inc_docs_indexed(&mut self, store: &str, count: u64) {
        with_local_recorder(&self.recorder, || {
            counter!(DOCS_INDEXED, "elasticsearch_host" => store.to_string()).increment(count);
        });
    }

    pub fn observe_index_time(&mut self, store: &str, elapsed: Duration) {
        with_local_recorder(&self.recorder, || {
            histogram!(INDEX_TIME, "elasticsearch_host" => store.to_string())
                .record(elapsed.as_secs_f64());
        });
    }

    pub fn inc_runs(&mut self) {
        with_local_recorder(&self.recorder, || counter!(RUNS).increment(1));
    }

    pub fn jobs_scraped(&self, cluster: &str) -> u64 {
        self.value(JOBS_SCRAPED, &[("cluster_name", cluster)]) as u64
    }

    pub fn scrape_errors(&self, cluster: &str, kind: &str) -> u64 {
        self.value(
            SCRAPE_ERRORS,
            &[("cluster_name", cluster), ("exception_type", kind)],
        ) as u64
    }

    /// Errors recorded for `cluster`, of any kind.
    pub fn total_scrape_errors(&self, cluster: &str) -> u64 {
        let series = format!("{}{{", SCRAPE_ERRORS);
        let cluster_label = format!("cluster_name=\"{}\"", cluster);
        self.render()
            .lines()
            .filter(|line| line.starts_with(&series) && line.contains(&cluster_label))
            .filter_map(sample_value)
            .sum::<f64>() as u64
    }

    pub fn scrape_time(&self, cluster: &str) -> Summary {
        self.summary(SCRAPE_TIME, &[("cluster_name", cluster)])
    }

    pub fn docs_indexed(&self, store: &str) -> u64 {
        self.value(DOCS_INDEXED, &[("elasticsearch_host", store)]) as u64
    }

    pub fn index_time(&self, store: &str) -> Summary {
        self.summary(INDEX_TIME, &[("elasticsearch_host", store)])
    }

    pub fn runs(&self) -> u64 {
        self.value(RUNS, &[]) as u64
    }

    /// Every recorded family in the Prometheus text format. Families with no
    /// samples are left out.
    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Current value of one series, 0 when it was never recorded.
    fn value(&self, name: &str, labels: &[(&str, &str)]) -> f64 {
        let series = self.series(name, labels);
        self.render()
            .lines()
            .find(|line| line.starts_with(&series))
            .and_then(sample_value)
            .unwrap_or(0.0)
    }

    fn summary(&self, name: &str, labels: &[(&str, &str)]) -> Summary {
        Summary {
            count: self.value(&format!("{}_count", name), labels) as u64,
            sum: self.value(&format!("{}_sum", name), labels),
        }
    }

    /// `name{instance="..",k="v",..} `, as the exporter writes a sample.
    fn series(&self, name: &str, labels: &[(&str, &str)]) -> String {
        let mut series = format!("{}{{instance=\"{}\"", name, self.instance);
        for (key, value) in labels {
            series.push_str(&format!(",{}=\"{}\"", key, value));
        }
        series.push_str("} ");
        series
    }
}

fn sample_value(line: &str) -> Option<f64> {
    line.rsplit(' ').next().and_then(|v| v.parse().ok())
}
