//! Remote configuration transport.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::SyncError;

/// Delivers the raw bytes of a configuration document.
#[async_trait]
pub trait ConfigFetcher: Send + Sync {
    /// Fetch the document at `url`.
    ///
    /// Any failure, including a non-2xx status or a timeout, is a
    /// [`SyncError::Transport`].
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, SyncError>;
}

/// HTTP `GET` fetcher with a per-request timeout.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, SyncError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Transport(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ConfigFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, SyncError> {
        let resp = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                SyncError::Transport(format!("timed out fetching {}", url))
            } else {
                SyncError::Transport(format!("GET {} failed: {}", url, e))
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SyncError::Transport(format!("GET {} returned {}", url, status)));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| SyncError::Transport(format!("reading body of {} failed: {}", url, e)))?;
        log::debug!("fetched {} bytes from {}", body.len(), url);
        Ok(body.to_vec())
    }
}
