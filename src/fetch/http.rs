//! HTTP client abstraction for testability.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// Errors from HTTP transport.
#[derive(Debug, Clone, Error)]
pub enum HttpError {
    /// Request could not be sent or the connection failed.
    #[error("request failed: {0}")]
    Request(String),

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// The client itself could not be constructed.
    #[error("failed to create HTTP client: {0}")]
    Build(String),
}

/// Async HTTP GET seam.
///
/// The fetcher only ever needs "bytes for a URL with a timeout"; this trait
/// keeps that surface minimal and lets tests inject scripted clients.
pub trait AsyncHttpClient: Send + Sync {
    /// Performs an HTTP GET and returns the full response body.
    fn get(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, HttpError>> + Send;
}

/// Real HTTP client backed by reqwest.
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestClient {
    /// Creates a client with the default 30 second timeout.
    pub fn new() -> Result<Self, HttpError> {
        Self::with_timeout(30)
    }

    /// Creates a client with a custom request timeout.
    pub fn with_timeout(timeout_secs: u64) -> Result<Self, HttpError> {
        let timeout = Duration::from_secs(timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;

        Ok(Self { client, timeout })
    }

    /// The per-request timeout this client was built with.
    pub fn request_timeout(&self) -> Duration {
        self.timeout
    }
}

impl AsyncHttpClient for ReqwestClient {
    async fn get(&self, url: &str) -> Result<Vec<u8>, HttpError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| HttpError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(HttpError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| HttpError::Request(e.to_string()))
    }
}
