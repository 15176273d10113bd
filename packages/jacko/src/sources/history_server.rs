use async_trait::async_trait;
use history_server_client::{ClientOptions, HistoryServerClient, HistoryServerError};

use crate::cluster::ClusterDescriptor;
use crate::error::{DetailError, DirectoryError};
use crate::record::JobRecord;
use crate::traits::HistorySource;

/// MapReduce job-history server over its REST API.
///
/// Cloning shares the underlying connection pool but no request state, so
/// every detail worker gets an independent session.
#[derive(Clone)]
pub struct HistoryServerSource {
    client: HistoryServerClient,
}

impl HistoryServerSource {
    pub fn new(client: HistoryServerClient) -> Self {
        Self { client }
    }

    pub fn connect(
        cluster: &ClusterDescriptor,
        options: ClientOptions,
    ) -> Result<Self, HistoryServerError> {
        let client = HistoryServerClient::with_options(&cluster.host, cluster.port, options)?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl HistorySource for HistoryServerSource {
    async fn list_jobs(&self, start_time: i64) -> Result<Vec<String>, DirectoryError> {
        let jobs = self
            .client
            .list_jobs(start_time)
            .await
            .map_err(directory_error)?;
        Ok(jobs.into_iter().map(|summary| summary.id).collect())
    }

    async fn fetch_job(&self, job_id: &str) -> Result<JobRecord, DetailError> {
        let job = self.client.get_job(job_id).await.map_err(detail_error)?;
        Ok(JobRecord::from(job))
    }

    fn endpoint(&self) -> String {
        self.client.jobs_url().to_string()
    }
}

fn directory_error(err: HistoryServerError) -> DirectoryError {
    match err {
        HistoryServerError::Http(e) => DirectoryError::Transport(Box::new(e)),
        HistoryServerError::Api { status, message } => DirectoryError::Status { status, message },
        other => DirectoryError::Malformed(other.to_string()),
    }
}

fn detail_error(err: HistoryServerError) -> DetailError {
    match err {
        HistoryServerError::Http(e) => DetailError::Transport(Box::new(e)),
        HistoryServerError::Api { status, message } => DetailError::Status { status, message },
        other => DetailError::Malformed(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        let err = directory_error(HistoryServerError::Api {
            status: 404,
            message: "gone".into(),
        });
        assert!(matches!(err, DirectoryError::Status { status: 404, .. }));

        let err = detail_error(HistoryServerError::MissingJob {
            job_id: "job_1".into(),
        });
        assert!(matches!(err, DetailError::Malformed(_)));
        assert!(err.is_isolated());
    }

    #[test]
    fn test_endpoint_names_jobs_url() {
        let cluster = ClusterDescriptor::new("prod", "rm-1", 19888);
        let source = HistoryServerSource::connect(&cluster, ClientOptions::default()).unwrap();

        assert_eq!(
            source.endpoint(),
            "http://rm-1:19888/ws/v1/history/mapreduce/jobs"
        );
    }
}
