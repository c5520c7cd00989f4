//! List import and export.
//!
//! The portable format is a versioned JSON document:
//!
//! ```json
//! {
//!   "list_name": "blocklist",
//!   "exported_at": "2024-01-01T00:00:00+00:00",
//!   "version": 1,
//!   "entries": [{ "domain": "example.com", "pattern_type": "domain", "metadata": {} }]
//! }
//! ```
//!
//! Ids and sources are not exported; an import always creates fresh rows.

use chrono::{SecondsFormat, Utc};
use dl_core::{EntryMetadata, ListEntry, PatternType, Source};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TransferError;
use crate::store::{EntryStore, OnConflict};

/// Current export format version.
pub const EXPORT_VERSION: u64 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct ExportDocument {
    pub list_name: String,
    pub exported_at: String,
    pub version: u64,
    pub entries: Vec<ExportedEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedEntry {
    pub domain: String,
    pub pattern_type: PatternType,
    #[serde(default, deserialize_with = "dl_core::types::null_as_default")]
    pub metadata: EntryMetadata,
}

/// Serialize every entry of `list_name` into an export document.
pub fn export_list(store: &EntryStore, list_name: &str) -> Result<String, TransferError> {
    let entries = store
        .get_by_list(list_name)?
        .into_iter()
        .map(|entry| ExportedEntry {
            domain: entry.domain,
            pattern_type: entry.pattern_type,
            metadata: entry.metadata,
        })
        .collect();

    let doc = ExportDocument {
        list_name: list_name.to_string(),
        exported_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        version: EXPORT_VERSION,
        entries,
    };
    serde_json::to_string_pretty(&doc)
        .map_err(|e| TransferError::InvalidFormat(format!("cannot encode export: {}", e)))
}

/// Replace the contents of `list_name` with the entries of an export document.
///
/// Every imported row is tagged with `source`. The clear and the inserts
/// happen in one transaction, so on failure the list is left untouched.
/// The document's own `list_name` is informational; rows always land in
/// `list_name`. Returns the number of entries created.
pub fn import_list(
    store: &EntryStore,
    list_name: &str,
    json_text: &str,
    source: Source,
) -> Result<usize, TransferError> {
    let entries = parse_document(json_text)?
        .into_iter()
        .map(|e| {
            ListEntry::new(list_name, e.domain, e.pattern_type, source).with_metadata(e.metadata)
        })
        .collect();

    let report = store
        .replace_entries(list_name, None, entries, OnConflict::Abort)
        .map_err(|e| TransferError::ImportFailed {
            list_name: list_name.to_string(),
            message: e.to_string(),
        })?;

    log::info!(
        "imported {} entries into '{}' (replaced {})",
        report.ids.len(),
        list_name,
        report.removed
    );
    Ok(report.ids.len())
}

fn parse_document(json_text: &str) -> Result<Vec<ExportedEntry>, TransferError> {
    let doc: Value = serde_json::from_str(json_text)
        .map_err(|e| TransferError::InvalidFormat(format!("not valid JSON: {}", e)))?;
    let Value::Object(mut doc) = doc else {
        return Err(TransferError::InvalidFormat("document is not an object".to_string()));
    };

    match doc.get("version") {
        None => {}
        Some(v) => match v.as_u64() {
            Some(version) if (1..=EXPORT_VERSION).contains(&version) => {}
            _ => {
                return Err(TransferError::InvalidFormat(format!(
                    "unsupported version {}",
                    v
                )))
            }
        },
    }

    let entries = match doc.remove("entries") {
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(TransferError::InvalidFormat("'entries' is not an array".to_string()))
        }
        None => return Err(TransferError::InvalidFormat("missing 'entries'".to_string())),
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            serde_json::from_value(item)
                .map_err(|e| TransferError::InvalidFormat(format!("entry {}: {}", i, e)))
        })
        .collect()
}
