//! Domain Lists Store
//!
//! Durable entry storage on redb, read-side list queries, and list
//! import/export.
//!
//! # Modules
//!
//! - `store`: The indexed [`EntryStore`]
//! - `lookup`: [`ListQuery`] (first match, classification)
//! - `transfer`: Versioned JSON export and all-or-nothing import
//! - `tables`: redb table definitions

pub mod error;
pub mod lookup;
pub mod store;
pub mod tables;
pub mod transfer;

pub use error::{StoreError, TransferError};
pub use lookup::ListQuery;
pub use store::{EntryStore, EntryUpdate, MetadataPatch, OnConflict, RejectedEntry, ReplaceReport};
pub use transfer::{export_list, import_list, ExportDocument, ExportedEntry};
