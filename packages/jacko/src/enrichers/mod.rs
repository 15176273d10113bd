//! Record enrichers, the per-cluster enrichment chain, and the registry
//! that maps configured enricher names to implementations.

mod cluster_name;
mod duration;
mod outcome;

pub use cluster_name::ClusterNameEnricher;
pub use duration::DurationEnricher;
pub use outcome::OutcomeEnricher;

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{ConfigError, EnrichmentError};
use crate::record::{JobRecord, CLUSTER, FINISH_TIME, ID};
use crate::traits::Enricher;

/// The ordered enrichers applied to one cluster's records: the cluster-name
/// enricher first, then the configured external enrichers in order.
pub struct EnrichmentChain {
    cluster_name: String,
    enrichers: Vec<Arc<dyn Enricher>>,
}

impl EnrichmentChain {
    pub fn for_cluster(cluster_name: &str, external: &[Arc<dyn Enricher>]) -> Self {
        let mut enrichers: Vec<Arc<dyn Enricher>> =
            Vec::with_capacity(external.len() + 1);
        enrichers.push(Arc::new(ClusterNameEnricher::new(cluster_name)));
        enrichers.extend(external.iter().cloned());

        Self {
            cluster_name: cluster_name.to_string(),
            enrichers,
        }
    }

    /// Enricher names in application order.
    pub fn names(&self) -> Vec<&str> {
        self.enrichers.iter().map(|e| e.name()).collect()
    }

    /// Run every enricher on `record`, in order.
    pub fn apply(&self, record: &mut JobRecord) -> Result<(), EnrichmentError> {
        let id = record.get(ID).cloned();
        let finish_time = record.get(FINISH_TIME).cloned();

        for enricher in &self.enrichers {
            enricher.enrich(record)?;
            self.check_protected(enricher.name(), record, &id, &finish_time)?;
        }
        Ok(())
    }

    /// Enrich a whole batch. The first failure aborts the batch.
    pub fn apply_all(&self, records: &mut [JobRecord]) -> Result<(), EnrichmentError> {
        records.iter_mut().try_for_each(|record| self.apply(record))
    }

    fn check_protected(
        &self,
        enricher: &str,
        record: &JobRecord,
        id: &Option<Value>,
        finish_time: &Option<Value>,
    ) -> Result<(), EnrichmentError> {
        let changed = if record.get(ID) != id.as_ref() {
            Some(ID)
        } else if record.get(FINISH_TIME) != finish_time.as_ref() {
            Some(FINISH_TIME)
        } else if record.get(CLUSTER).and_then(Value::as_str) != Some(self.cluster_name.as_str()) {
            Some(CLUSTER)
        } else {
            None
        };

        match changed {
            Some(field) => Err(EnrichmentError::ProtectedField {
                enricher: enricher.to_string(),
                field: field.to_string(),
                job_id: id
                    .as_ref()
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            }),
            None => Ok(()),
        }
    }
}

type Constructor = fn() -> Arc<dyn Enricher>;

/// Startup-time mapping from enricher name to constructor.
pub struct EnricherRegistry {
    constructors: BTreeMap<String, Constructor>,
}

impl Default for EnricherRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl EnricherRegistry {
    /// An empty registry.
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// Registry with every enricher shipped in this crate.
    pub fn builtin() -> Self {
        Self::empty()
            .with(DurationEnricher::NAME, || Arc::new(DurationEnricher))
            .with(OutcomeEnricher::NAME, || Arc::new(OutcomeEnricher))
    }

    pub fn with(mut self, name: impl Into<String>, constructor: Constructor) -> Self {
        self.constructors.insert(name.into(), constructor);
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    pub fn build(&self, name: &str) -> Result<Arc<dyn Enricher>, ConfigError> {
        self.constructors
            .get(name)
            .map(|construct| construct())
            .ok_or_else(|| ConfigError::UnknownEnricher {
                name: name.to_string(),
                known: self.names().join(", "),
            })
    }

    /// Build the named enrichers in order, failing on the first unknown name.
    pub fn build_all(&self, names: &[String]) -> Result<Vec<Arc<dyn Enricher>>, ConfigError> {
        names.iter().map(|name| self.build(name)).collect()
    }
}
