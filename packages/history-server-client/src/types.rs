use serde::Deserialize;
use serde_json::{Map, Value};

/// Envelope of `GET /ws/v1/history/mapreduce/jobs`.
///
/// The server sends `"jobs": null` when nothing finished in the window.
#[derive(Debug, Clone, Deserialize)]
pub struct JobsResponse {
    #[serde(default)]
    pub jobs: Option<JobList>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobList {
    #[serde(default)]
    pub job: Vec<JobSummary>,
}

/// One entry of the job directory listing.
#[derive(Debug, Clone, Deserialize)]
pub struct JobSummary {
    pub id: String,
    #[serde(rename = "finishTime", default)]
    pub finish_time: Option<i64>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Envelope of `GET /ws/v1/history/mapreduce/jobs/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct JobResponse {
    #[serde(default)]
    pub job: Option<Map<String, Value>>,
}
