use thiserror::Error;

/// Errors returned by the search index client.
#[derive(Debug, Error)]
pub enum SearchIndexError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// The bulk request went through but some items were rejected
    #[error("{failed} of {total} bulk items rejected, first: {first_reason}")]
    BulkRejected {
        failed: usize,
        total: usize,
        first_reason: String,
    },
}

pub type Result<T> = std::result::Result<T, SearchIndexError>;
