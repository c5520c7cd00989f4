//! Error types for the sync layer.

use dl_store::StoreError;
use thiserror::Error;

/// Errors that can occur while fetching or applying a remote configuration.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Fetch failed, timed out or returned a non-success status.
    #[error("transport error: {0}")]
    Transport(String),

    /// The payload is not a usable configuration document.
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
