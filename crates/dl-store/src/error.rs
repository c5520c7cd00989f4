//! Error types for the entry store and list transfer.

use dl_core::EntryId;
use thiserror::Error;

/// Errors raised by [`crate::EntryStore`] operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("entry '{domain}' already exists in list '{list_name}'")]
    DuplicateKey { list_name: String, domain: String },

    #[error("entry {0} not found")]
    NotFound(EntryId),

    #[error("invalid entry: {0}")]
    InvalidEntry(String),

    #[error("database error: {0}")]
    Database(#[from] redb::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<redb::DatabaseError> for StoreError {
    fn from(value: redb::DatabaseError) -> Self {
        Self::Database(value.into())
    }
}

impl From<redb::TransactionError> for StoreError {
    fn from(value: redb::TransactionError) -> Self {
        Self::Database(value.into())
    }
}

impl From<redb::TableError> for StoreError {
    fn from(value: redb::TableError) -> Self {
        Self::Database(value.into())
    }
}

impl From<redb::StorageError> for StoreError {
    fn from(value: redb::StorageError) -> Self {
        Self::Database(value.into())
    }
}

impl From<redb::CommitError> for StoreError {
    fn from(value: redb::CommitError) -> Self {
        Self::Database(value.into())
    }
}

/// Errors raised by list import and export.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("invalid list document: {0}")]
    InvalidFormat(String),

    #[error("import into '{list_name}' failed: {message}")]
    ImportFailed { list_name: String, message: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}
