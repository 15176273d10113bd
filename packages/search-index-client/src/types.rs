use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A document to upsert through the bulk API.
#[derive(Debug, Clone)]
pub struct BulkDocument<S> {
    /// Target index name
    pub index: String,
    /// Document identifier; writing the same id twice overwrites
    pub id: String,
    /// Mapping type, for stores that still use them
    pub doc_type: Option<String>,
    pub source: S,
}

impl<S> BulkDocument<S> {
    pub fn new(index: impl Into<String>, id: impl Into<String>, source: S) -> Self {
        Self {
            index: index.into(),
            id: id.into(),
            doc_type: None,
            source,
        }
    }

    pub fn with_type(mut self, doc_type: Option<String>) -> Self {
        self.doc_type = doc_type;
        self
    }
}

/// `{"index": {...}}` action line of a bulk body.
#[derive(Debug, Serialize)]
pub(crate) struct BulkAction<'a> {
    pub index: BulkActionMeta<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct BulkActionMeta<'a> {
    #[serde(rename = "_index")]
    pub index: &'a str,
    #[serde(rename = "_id")]
    pub id: &'a str,
    #[serde(rename = "_type", skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<&'a str>,
}

/// Response of `POST /_bulk`.
#[derive(Debug, Clone, Deserialize)]
pub struct BulkResponse {
    #[serde(default)]
    pub errors: bool,
    #[serde(default)]
    pub items: Vec<HashMap<String, BulkItem>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkItem {
    #[serde(rename = "_index", default)]
    pub index: Option<String>,
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub error: Option<Value>,
}

/// Outcome of a successful (possibly chunked) bulk write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkSummary {
    /// Items accepted by the store
    pub indexed: usize,
    /// Bulk requests sent
    pub requests: usize,
}
