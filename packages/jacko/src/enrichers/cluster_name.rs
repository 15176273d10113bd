use crate::error::EnrichmentError;
use crate::record::{JobRecord, CLUSTER};
use crate::traits::Enricher;

/// Stamps every record with the name of the cluster it was scraped from.
pub struct ClusterNameEnricher {
    cluster_name: String,
}

impl ClusterNameEnricher {
    pub fn new(cluster_name: impl Into<String>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
        }
    }
}

impl Enricher for ClusterNameEnricher {
    fn name(&self) -> &str {
        "cluster_name"
    }

    fn enrich(&self, record: &mut JobRecord) -> Result<(), EnrichmentError> {
        record.insert(CLUSTER, self.cluster_name.as_str());
        Ok(())
    }
}
