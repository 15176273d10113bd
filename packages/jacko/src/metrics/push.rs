use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

use super::RunMetrics;
use crate::error::PushError;

/// Grouping key job name under which run metrics are pushed.
pub const PUSH_JOB: &str = "jacko";
pub const PUSH_TIMEOUT: Duration = Duration::from_secs(5);

const TEXT_FORMAT: &str = "text/plain; version=0.0.4";

/// A Prometheus push gateway.
#[derive(Debug, Clone)]
pub struct PushGateway {
    client: Client,
    url: String,
}

impl PushGateway {
    pub fn new(gateway: &str, job: &str) -> Result<Self, PushError> {
        let client = Client::builder().timeout(PUSH_TIMEOUT).build()?;
        Ok(Self::with_client(client, gateway, job))
    }

    pub fn with_client(client: Client, gateway: &str, job: &str) -> Self {
        let base = if gateway.contains("://") {
            gateway.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", gateway.trim_end_matches('/'))
        };
        Self {
            client,
            url: format!("{}/metrics/job/{}", base, job),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Push-add: replaces only the metric families contained in this push.
    pub async fn push_add(&self, metrics: &RunMetrics) -> Result<(), PushError> {
        let resp = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, TEXT_FORMAT)
            .body(metrics.render())
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(PushError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        debug!(gateway = %self.url, "Pushed metrics");
        Ok(())
    }
}

/// Push to every gateway. Failures are logged and otherwise ignored.
/// Returns how many pushes succeeded.
pub async fn push_all(gateways: &[String], metrics: &RunMetrics) -> usize {
    let mut pushed = 0;
    for gateway in gateways {
        let result = match PushGateway::new(gateway, PUSH_JOB) {
            Ok(sink) => sink.push_add(metrics).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => pushed += 1,
            Err(e) => warn!(gateway = %gateway, error = %e, "Failed to push metrics"),
        }
    }
    pushed
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Accept one request, reply with `status`, and hand back the raw request.
    async fn gateway(status: u16) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let length = text[..head_end]
                        .lines()
                        .find_map(|l| {
                            l.to_ascii_lowercase()
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if request.len() >= head_end + 4 + length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {} X\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                status
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });
        (addr, handle)
    }

    #[test]
    fn test_url_for_bare_host() {
        let gateway = PushGateway::new("pushgw:9091", PUSH_JOB).unwrap();
        assert_eq!(gateway.url(), "http://pushgw:9091/metrics/job/jacko");

        let gateway = PushGateway::new("https://pushgw/", PUSH_JOB).unwrap();
        assert_eq!(gateway.url(), "https://pushgw/metrics/job/jacko");
    }

    #[tokio::test]
    async fn test_push_add_posts_text_format() {
        let (addr, request) = gateway(200).await;
        let mut metrics = RunMetrics::new("host-1");
        metrics.inc_runs();

        PushGateway::new(&addr, PUSH_JOB)
            .unwrap()
            .push_add(&metrics)
            .await
            .unwrap();

        let request = request.await.unwrap();
        assert!(request.starts_with("POST /metrics/job/jacko HTTP/1.1"));
        assert!(request.contains("jacko_runs_total{instance=\"host-1\"} 1"));
    }

    #[tokio::test]
    async fn test_push_failures_are_counted_not_raised() {
        let (addr, _request) = gateway(500).await;
        let metrics = RunMetrics::new("host-1");

        let pushed = push_all(&[addr], &metrics).await;

        assert_eq!(pushed, 0);
    }
}
