use std::time::Duration;

use tagscout_crawler::CrawlError;
use thiserror::Error;

/// Errors returned by the automation-service client.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request to {url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("automation service refused credentials ({status}) for {url}")]
    Unauthorized { status: u16, url: String },

    #[error("not found: {url}")]
    NotFound { url: String },

    #[error("rate limited by automation service (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("automation service error {status} from {url}")]
    Server { status: u16, url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid base URL \"{url}\": {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

impl From<BrowserError> for CrawlError {
    fn from(err: BrowserError) -> Self {
        match err {
            BrowserError::Timeout { timeout_ms, .. } => CrawlError::Timeout { timeout_ms },
            BrowserError::Unauthorized { .. } => CrawlError::Auth(err.to_string()),
            BrowserError::NotFound { url } => CrawlError::NotFound(url),
            BrowserError::RateLimited { retry_after } => CrawlError::RateLimited { retry_after },
            BrowserError::Server { .. } => CrawlError::Network(err.to_string()),
            BrowserError::Http(ref e) if e.is_connect() || e.is_request() || e.is_body() => {
                CrawlError::Network(err.to_string())
            }
            BrowserError::Deserialize { ref context, ref source } => {
                CrawlError::Payload {
                    context: context.clone(),
                    reason: source.to_string(),
                }
            }
            BrowserError::Http(_)
            | BrowserError::UnexpectedStatus { .. }
            | BrowserError::InvalidBaseUrl { .. } => CrawlError::Engine(err.to_string()),
        }
    }
}
