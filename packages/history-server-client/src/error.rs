use thiserror::Error;

/// Errors returned by the job-history server client.
#[derive(Debug, Error)]
pub enum HistoryServerError {
    /// Transport-level failure (connect, timeout, broken request)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The response body was not the JSON shape we expect
    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// A job detail response without a `job` object
    #[error("no job object returned for {job_id}")]
    MissingJob { job_id: String },
}

impl HistoryServerError {
    /// Whether the request that produced this error is worth repeating.
    ///
    /// Connection problems, timeouts and gateway-style 5xx responses are;
    /// client errors and undecodable bodies are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            Self::Api { status, .. } => RETRYABLE_STATUSES.contains(status),
            Self::Decode(_) | Self::MissingJob { .. } => false,
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub(crate) const RETRYABLE_STATUSES: [u16; 4] = [500, 502, 503, 504];

pub type Result<T> = std::result::Result<T, HistoryServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_errors_are_retryable() {
        for status in [500, 502, 503, 504] {
            let err = HistoryServerError::Api {
                status,
                message: String::new(),
            };
            assert!(err.is_retryable(), "{status} should retry");
        }
    }

    #[test]
    fn test_client_errors_are_not_retryable() {
        for status in [400, 401, 404, 501] {
            let err = HistoryServerError::Api {
                status,
                message: "nope".into(),
            };
            assert!(!err.is_retryable(), "{status} should not retry");
            assert_eq!(err.status(), Some(status));
        }
    }

    #[test]
    fn test_decode_and_missing_job_are_final() {
        let decode = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(!HistoryServerError::Decode(decode).is_retryable());
        assert!(!HistoryServerError::MissingJob {
            job_id: "job_1".into()
        }
        .is_retryable());
    }
}
