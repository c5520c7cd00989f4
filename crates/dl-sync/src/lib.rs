//! Domain Lists Sync
//!
//! Fetches the remote configuration and merges its `backend` entries into
//! an [`dl_store::EntryStore`] without touching locally owned rows.

pub mod engine;
pub mod error;
pub mod fetch;

pub use engine::{SyncEngine, SyncIssue, SyncResult, SyncStage};
pub use error::SyncError;
pub use fetch::{ConfigFetcher, HttpFetcher};
