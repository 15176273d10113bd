//! Minimal Elasticsearch-compatible REST client.
//!
//! Covers exactly what a write-mostly ingestion job needs: NDJSON bulk
//! upserts (split into fixed-size chunks) and single-value `max`
//! aggregations over an index pattern.
//!
//! # Example
//!
//! ```rust,ignore
//! use search_index_client::{BulkDocument, SearchIndexClient};
//!
//! let client = SearchIndexClient::new("localhost:9200")?;
//! let docs = vec![BulkDocument::new("jobs-2024-03-01", "job_1", json!({"finishTime": 1})) ];
//! client.bulk_index(&docs).await?;
//!
//! let latest = client
//!     .max_aggregation("jobs-*", Some("jobs-????-??-??"), &[("cluster", "prod")], "finishTime")
//!     .await?;
//! ```

pub mod error;
pub mod types;

pub use error::{Result, SearchIndexError};
pub use types::{BulkDocument, BulkItem, BulkResponse, BulkSummary};

use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;
use types::{BulkAction, BulkActionMeta};

/// Documents per bulk request.
pub const BULK_CHUNK_SIZE: usize = 500;

const MAX_AGG_NAME: &str = "maxValue";

pub struct SearchIndexClient {
    client: reqwest::Client,
    base_url: String,
}

impl SearchIndexClient {
    pub fn new(host: &str) -> Result<Self> {
        Self::with_timeout(host, Duration::from_secs(30))
    }

    pub fn with_timeout(host: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: normalize_host(host),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Upsert every document, `BULK_CHUNK_SIZE` per request. Stops at the
    /// first chunk the store rejects.
    pub async fn bulk_index<S: Serialize>(&self, docs: &[BulkDocument<S>]) -> Result<BulkSummary> {
        let mut summary = BulkSummary::default();
        let url = format!("{}/_bulk", self.base_url);

        for chunk in docs.chunks(BULK_CHUNK_SIZE) {
            let body = render_bulk_body(chunk)?;
            let resp = self
                .client
                .post(&url)
                .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
                .body(body)
                .send()
                .await?;

            let text = read_success_body(resp).await?;
            summary.indexed += check_bulk_response(&text)?;
            summary.requests += 1;
            debug!(chunk = chunk.len(), indexed = summary.indexed, "Bulk chunk written");
        }

        Ok(summary)
    }

    /// Maximum of `field` across documents in `index_pattern` matching every
    /// `(field, value)` pair. `index_wildcard`, when given, further restricts
    /// the `_index` of matching documents. `None` when nothing matched.
    pub async fn max_aggregation(
        &self,
        index_pattern: &str,
        index_wildcard: Option<&str>,
        must_match: &[(&str, &str)],
        field: &str,
    ) -> Result<Option<f64>> {
        let url = format!("{}/{}/_search", self.base_url, index_pattern);
        let filter_path = format!("aggregations.{}.value", MAX_AGG_NAME);
        let resp = self
            .client
            .post(&url)
            .query(&[("filter_path", filter_path.as_str())])
            .json(&max_query_body(index_wildcard, must_match, field))
            .send()
            .await?;

        let text = read_success_body(resp).await?;
        parse_max_aggregation(&text)
    }
}

async fn read_success_body(resp: reqwest::Response) -> Result<String> {
    let status = resp.status();
    if !status.is_success() {
        let message = resp.text().await.unwrap_or_default();
        return Err(SearchIndexError::Api {
            status: status.as_u16(),
            message,
        });
    }
    Ok(resp.text().await?)
}

/// Add an `http://` scheme to a bare `host[:port]`.
pub fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    }
}

/// Render documents as an NDJSON bulk body (action line, source line).
pub fn render_bulk_body<S: Serialize>(docs: &[BulkDocument<S>]) -> Result<String> {
    let mut body = String::new();
    for doc in docs {
        let action = BulkAction {
            index: BulkActionMeta {
                index: &doc.index,
                id: &doc.id,
                doc_type: doc.doc_type.as_deref(),
            },
        };
        body.push_str(&serde_json::to_string(&action)?);
        body.push('\n');
        body.push_str(&serde_json::to_string(&doc.source)?);
        body.push('\n');
    }
    Ok(body)
}

/// Count accepted items, or fail if the store flagged any item.
pub fn check_bulk_response(body: &str) -> Result<usize> {
    let response: BulkResponse = serde_json::from_str(body)?;
    let total = response.items.len();
    let rejected: Vec<&BulkItem> = response
        .items
        .iter()
        .flat_map(|item| item.values())
        .filter(|item| item.error.is_some() || item.status >= 300)
        .collect();

    if response.errors || !rejected.is_empty() {
        let first_reason = rejected
            .first()
            .and_then(|item| item.error.as_ref())
            .map(|error| {
                error
                    .get("reason")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| error.to_string())
            })
            .unwrap_or_else(|| "unknown".to_string());
        return Err(SearchIndexError::BulkRejected {
            failed: rejected.len(),
            total,
            first_reason,
        });
    }

    Ok(total)
}

pub fn max_query_body(index_wildcard: Option<&str>, must_match: &[(&str, &str)], field: &str) -> Value {
    let mut must: Vec<Value> = must_match
        .iter()
        .map(|(name, value)| json!({ "match": { *name: *value } }))
        .collect();
    if let Some(wildcard) = index_wildcard {
        must.push(json!({ "wildcard": { "_index": { "value": wildcard } } }));
    }

    json!({
        "size": 0,
        "_source": false,
        "query": { "bool": { "must": must } },
        "aggs": { MAX_AGG_NAME: { "max": { "field": field } } }
    })
}

/// Read the aggregation value out of a `filter_path`-trimmed response.
pub fn parse_max_aggregation(body: &str) -> Result<Option<f64>> {
    let value: Value = serde_json::from_str(body)?;
    Ok(value
        .get("aggregations")
        .and_then(|aggs| aggs.get(MAX_AGG_NAME))
        .and_then(|agg| agg.get("value"))
        .and_then(Value::as_f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_host() {
        assert_eq!(normalize_host("es-1:9200"), "http://es-1:9200");
        assert_eq!(normalize_host("https://es-1:9200/"), "https://es-1:9200");
    }

    #[test]
    fn test_render_bulk_body() {
        let docs = vec![
            BulkDocument::new("jacko-2024-03-01", "job_1", json!({"id": "job_1"})),
            BulkDocument::new("jacko-2024-03-02", "job_2", json!({"id": "job_2"}))
                .with_type(Some("history_server".into())),
        ];

        let body = render_bulk_body(&docs).unwrap();
        let lines: Vec<&str> = body.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(body.ends_with('\n'));
        assert_eq!(
            lines[0],
            r#"{"index":{"_index":"jacko-2024-03-01","_id":"job_1"}}"#
        );
        assert_eq!(lines[1], r#"{"id":"job_1"}"#);
        assert_eq!(
            lines[2],
            r#"{"index":{"_index":"jacko-2024-03-02","_id":"job_2","_type":"history_server"}}"#
        );
    }

    #[test]
    fn test_check_bulk_response_ok() {
        let body = r#"{"took":3,"errors":false,"items":[
            {"index":{"_index":"a","_id":"1","status":201}},
            {"index":{"_index":"a","_id":"2","status":200}}
        ]}"#;
        assert_eq!(check_bulk_response(body).unwrap(), 2);
    }

    #[test]
    fn test_check_bulk_response_rejected() {
        let body = r#"{"took":3,"errors":true,"items":[
            {"index":{"_index":"a","_id":"1","status":201}},
            {"index":{"_index":"a","_id":"2","status":400,
              "error":{"type":"mapper_parsing_exception","reason":"failed to parse field [finishTime]"}}}
        ]}"#;

        match check_bulk_response(body).unwrap_err() {
            SearchIndexError::BulkRejected {
                failed,
                total,
                first_reason,
            } => {
                assert_eq!(failed, 1);
                assert_eq!(total, 2);
                assert_eq!(first_reason, "failed to parse field [finishTime]");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_max_query_body() {
        let body = max_query_body(None, &[("cluster", "prod")], "finishTime");
        assert_eq!(body["size"], 0);
        assert_eq!(
            body["query"]["bool"]["must"][0]["match"]["cluster"],
            "prod"
        );
        assert_eq!(body["query"]["bool"]["must"].as_array().unwrap().len(), 1);
        assert_eq!(body["aggs"][MAX_AGG_NAME]["max"]["field"], "finishTime");
    }

    #[test]
    fn test_max_query_body_restricts_index() {
        let body = max_query_body(Some("jobs-????-??-??"), &[("cluster", "prod")], "finishTime");
        assert_eq!(
            body["query"]["bool"]["must"][1]["wildcard"]["_index"]["value"],
            "jobs-????-??-??"
        );
    }

    #[test]
    fn test_parse_max_aggregation() {
        let body = format!(r#"{{"aggregations":{{"{}":{{"value":1709251200000.0}}}}}}"#, MAX_AGG_NAME);
        assert_eq!(parse_max_aggregation(&body).unwrap(), Some(1_709_251_200_000.0));

        let null = format!(r#"{{"aggregations":{{"{}":{{"value":null}}}}}}"#, MAX_AGG_NAME);
        assert_eq!(parse_max_aggregation(&null).unwrap(), None);

        // filter_path drops everything when no index matched
        assert_eq!(parse_max_aggregation("{}").unwrap(), None);
    }

    #[tokio::test]
    async fn test_unreachable_store_is_an_http_error() {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let client = SearchIndexClient::new(&format!("127.0.0.1:{}", port)).unwrap();

        let err = client
            .max_aggregation("jacko-*", None, &[("cluster", "prod")], "finishTime")
            .await
            .unwrap_err();
        assert!(matches!(err, SearchIndexError::Http(_)));
    }
}
