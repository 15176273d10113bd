//! The job record flowing through the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Unique job identifier within a cluster.
pub const ID: &str = "id";
/// Epoch milliseconds at which the job finished, as reported by the server.
pub const FINISH_TIME: &str = "finishTime";
/// UTC time at which the detail was fetched.
pub const TIMESTAMP: &str = "timestamp";
/// Name of the cluster the job ran on.
pub const CLUSTER: &str = "cluster";

/// A job as returned by the history server, plus enrichment fields.
///
/// Serializes as the bare JSON object, which is also the indexed document
/// body. An empty record is the sentinel for a failed fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobRecord(Map<String, Value>);

impl JobRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Placeholder yielded by a detail fetch that could not produce a record.
    pub fn sentinel() -> Self {
        Self::default()
    }

    /// The job id, if present and non-empty.
    pub fn id(&self) -> Option<&str> {
        self.0
            .get(ID)
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
    }

    /// Finish time in epoch milliseconds. Floats are truncated.
    pub fn finish_time(&self) -> Option<i64> {
        let value = self.0.get(FINISH_TIME)?;
        value
            .as_i64()
            .or_else(|| value.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
    }

    /// Only records with an id may be enriched or indexed.
    pub fn is_valid(&self) -> bool {
        self.id().is_some()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    /// Record when this job's detail was fetched.
    pub fn stamp_fetched_at(&mut self, at: DateTime<Utc>) {
        self.insert(TIMESTAMP, at.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string());
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.0.get(TIMESTAMP)?.as_str()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for JobRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn record(value: Value) -> JobRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_sentinel_is_invalid() {
        assert!(!JobRecord::sentinel().is_valid());
        assert!(!record(json!({"id": ""})).is_valid());
        assert!(!record(json!({"id": 42})).is_valid());
        assert!(record(json!({"id": "job_1"})).is_valid());
    }

    #[test]
    fn test_finish_time() {
        assert_eq!(
            record(json!({"finishTime": 1709251200000i64})).finish_time(),
            Some(1_709_251_200_000)
        );
        assert_eq!(
            record(json!({"finishTime": 1709251200000.9})).finish_time(),
            Some(1_709_251_200_000)
        );
        assert_eq!(record(json!({"finishTime": "soon"})).finish_time(), None);
        assert_eq!(JobRecord::new().finish_time(), None);
    }

    #[test]
    fn test_stamp_fetched_at_format() {
        let mut job = record(json!({"id": "job_1"}));
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap()
            + chrono::Duration::microseconds(42);

        job.stamp_fetched_at(at);

        assert_eq!(
            job.get(TIMESTAMP),
            Some(&Value::from("2024-03-01T12:30:05.000042Z"))
        );
        assert_eq!(job.fetched_at(), Some(at));
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let job = record(json!({"id": "job_1", "finishTime": 5}));
        assert_eq!(
            serde_json::to_value(&job).unwrap(),
            json!({"id": "job_1", "finishTime": 5})
        );
    }
}
