use async_trait::async_trait;
use search_index_client::{BulkDocument, SearchIndexClient, SearchIndexError};
use std::time::Duration;
use tracing::debug;

use crate::error::StoreError;
use crate::pipeline::IndexLayout;
use crate::record::{CLUSTER, FINISH_TIME};
use crate::traits::{IndexDocument, IndexStore};

/// Elasticsearch-compatible search store.
pub struct ElasticsearchIndex {
    client: SearchIndexClient,
    host: String,
    doc_type: Option<String>,
}

impl ElasticsearchIndex {
    /// `doc_type` is written as `_type` and used as a checkpoint filter,
    /// for stores that still use mapping types.
    pub fn new(
        host: &str,
        doc_type: Option<String>,
        timeout: Duration,
    ) -> Result<Self, SearchIndexError> {
        Ok(Self {
            client: SearchIndexClient::with_timeout(host, timeout)?,
            host: host.to_string(),
            doc_type,
        })
    }
}

#[async_trait]
impl IndexStore for ElasticsearchIndex {
    async fn bulk_upsert(&self, docs: Vec<IndexDocument>) -> Result<usize, StoreError> {
        let docs: Vec<BulkDocument<_>> = docs
            .into_iter()
            .map(|doc| {
                BulkDocument::new(doc.partition, doc.id, doc.record).with_type(self.doc_type.clone())
            })
            .collect();

        let summary = self.client.bulk_index(&docs).await.map_err(StoreError::new)?;
        debug!(
            host = %self.host,
            indexed = summary.indexed,
            requests = summary.requests,
            "Bulk upsert finished"
        );
        Ok(summary.indexed)
    }

    async fn max_finish_time(
        &self,
        layout: &IndexLayout,
        cluster: &str,
    ) -> Result<Option<i64>, StoreError> {
        let mut must_match = vec![(CLUSTER, cluster)];
        if let Some(doc_type) = &self.doc_type {
            must_match.push(("_type", doc_type.as_str()));
        }

        let wildcard = layout.partition_wildcard();
        let max = self
            .client
            .max_aggregation(&layout.pattern(), Some(wildcard.as_str()), &must_match, FINISH_TIME)
            .await
            .map_err(StoreError::new)?;
        Ok(max.map(|value| value as i64))
    }

    fn describe(&self) -> String {
        self.host.clone()
    }
}
