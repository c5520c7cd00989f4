//! Sync/Merge Engine
//!
//! Reconciles stored lists with a remote configuration document of the form
//! `{ "lists": { "<name>": [{ "domain", "pattern_type", "metadata" }] } }`.
//! Only `backend` rows are replaced; `user` and `generated` rows are never
//! touched.
//!
//! Syncs of the same list are not serialized against each other here. Each
//! list merge is a single store transaction, so a racing sync can never
//! observe a half-replaced list, but the last writer wins.

use std::fmt;

use dl_core::{EntryMetadata, ListEntry, PatternType, Source};
use dl_store::{EntryStore, OnConflict, ReplaceReport, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SyncError;
use crate::fetch::ConfigFetcher;

// =============================================================================
// Result Types
// =============================================================================

/// Where a sync problem happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStage {
    Fetch,
    Parse,
    ListShape,
    Entry,
    Store,
}

impl SyncStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Parse => "parse",
            Self::ListShape => "list_shape",
            Self::Entry => "entry",
            Self::Store => "store",
        }
    }
}

/// One problem recorded during a sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncIssue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list: Option<String>,
    pub stage: SyncStage,
    pub message: String,
}

impl SyncIssue {
    fn new(list: Option<&str>, stage: SyncStage, message: impl Into<String>) -> Self {
        Self {
            list: list.map(str::to_string),
            stage,
            message: message.into(),
        }
    }
}

impl fmt::Display for SyncIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.list {
            Some(list) => write!(f, "[{}] {}: {}", self.stage.as_str(), list, self.message),
            None => write!(f, "[{}] {}", self.stage.as_str(), self.message),
        }
    }
}

/// Outcome of one [`SyncEngine::sync_from_config`] call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncResult {
    /// True iff the document was fetched and parsed
    pub success: bool,
    /// Lists merged, in payload order
    pub lists_updated: Vec<String>,
    pub errors: Vec<SyncIssue>,
}

impl SyncResult {
    fn failed(issue: SyncIssue) -> Self {
        Self {
            success: false,
            lists_updated: Vec::new(),
            errors: vec![issue],
        }
    }
}

// =============================================================================
// Payload
// =============================================================================

/// One raw entry record from the payload.
#[derive(Debug, Deserialize)]
struct RawRecord {
    domain: String,
    #[serde(default = "default_pattern_type")]
    pattern_type: PatternType,
    #[serde(default, deserialize_with = "dl_core::types::null_as_default")]
    metadata: EntryMetadata,
}

fn default_pattern_type() -> PatternType {
    PatternType::Domain
}

/// The parts of the payload this engine consumes.
struct Payload {
    version: Option<String>,
    lists: Option<Map<String, Value>>,
}

fn parse_payload(body: &[u8]) -> Result<Payload, SyncError> {
    let doc: Value = serde_json::from_slice(body)
        .map_err(|e| SyncError::InvalidFormat(format!("not valid JSON: {}", e)))?;
    let Value::Object(mut doc) = doc else {
        return Err(SyncError::InvalidFormat("payload is not an object".to_string()));
    };

    let version = match doc.get("version") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };

    let lists = match doc.remove("lists") {
        None | Some(Value::Null) => None,
        Some(Value::Object(lists)) => Some(lists),
        Some(_) => return Err(SyncError::InvalidFormat("'lists' is not an object".to_string())),
    };

    Ok(Payload { version, lists })
}

// =============================================================================
// Engine
// =============================================================================

/// Applies remote configuration documents to an [`EntryStore`].
pub struct SyncEngine<F> {
    store: EntryStore,
    fetcher: F,
}

impl<F: ConfigFetcher> SyncEngine<F> {
    pub fn new(store: EntryStore, fetcher: F) -> Self {
        Self { store, fetcher }
    }

    pub fn store(&self) -> &EntryStore {
        &self.store
    }

    /// Fetch the configuration at `config_url` and merge every list in it.
    ///
    /// Never fails: problems are collected in the result. Fetch and parse
    /// failures are terminal and leave the store untouched.
    pub async fn sync_from_config(&self, config_url: &str) -> SyncResult {
        let body = match self.fetcher.fetch(config_url).await {
            Ok(body) => body,
            Err(e) => {
                log::warn!("sync from {} failed: {}", config_url, e);
                return SyncResult::failed(SyncIssue::new(None, SyncStage::Fetch, e.to_string()));
            }
        };

        let store = self.store.clone();
        let result = match tokio::task::spawn_blocking(move || {
            apply_to_store(&store, &body)
        })
        .await
        {
            Ok(result) => result,
            Err(e) => {
                log::warn!("sync from {}: merge task failed: {}", config_url, e);
                SyncResult::failed(SyncIssue::new(
                    None,
                    SyncStage::Store,
                    format!("merge task failed: {}", e),
                ))
            }
        };
        log::info!(
            "sync from {}: success={} lists_updated={} issues={}",
            config_url,
            result.success,
            result.lists_updated.len(),
            result.errors.len()
        );
        result
    }

    /// Merge an already fetched configuration document.
    ///
    /// Blocks on store writes; async callers go through
    /// [`Self::sync_from_config`].
    pub fn apply_payload(&self, body: &[u8]) -> SyncResult {
        apply_to_store(&self.store, body)
    }

    /// Replace the backend rows of `list_name` with `entries`.
    ///
    /// Every entry is forced to `source = backend`. Entries the store
    /// rejects (for example a domain already held by a user row) are left
    /// out and reported; everything else commits atomically.
    pub fn merge_backend_list(
        &self,
        list_name: &str,
        entries: Vec<ListEntry>,
    ) -> Result<ReplaceReport, StoreError> {
        merge_into_store(&self.store, list_name, entries)
    }
}

fn apply_to_store(store: &EntryStore, body: &[u8]) -> SyncResult {
    let payload = match parse_payload(body) {
        Ok(payload) => payload,
        Err(e) => {
            log::warn!("sync payload rejected: {}", e);
            return SyncResult::failed(SyncIssue::new(None, SyncStage::Parse, e.to_string()));
        }
    };

    let mut result = SyncResult {
        success: true,
        ..Default::default()
    };

    let Some(lists) = payload.lists else {
        log::info!("sync payload has no 'lists' field; nothing to update");
        result
            .errors
            .push(SyncIssue::new(None, SyncStage::Parse, "payload has no 'lists' field"));
        return result;
    };

    let sync_timestamp = chrono::Utc::now().timestamp_millis();
    for (list_name, value) in lists {
        let Value::Array(records) = value else {
            log::warn!("sync: list '{}' is not an array, skipped", list_name);
            result.errors.push(SyncIssue::new(
                Some(&list_name),
                SyncStage::ListShape,
                "expected an array of entries",
            ));
            continue;
        };

        let entries = build_entries(
            &list_name,
            records,
            payload.version.as_deref(),
            sync_timestamp,
            &mut result.errors,
        );

        match merge_into_store(store, &list_name, entries) {
            Ok(report) => {
                for rejected in report.rejected {
                    log::warn!(
                        "sync: '{}' entry '{}' skipped: {}",
                        list_name,
                        rejected.domain,
                        rejected.error
                    );
                    result.errors.push(SyncIssue::new(
                        Some(&list_name),
                        SyncStage::Entry,
                        format!("{}: {}", rejected.domain, rejected.error),
                    ));
                }
                log::debug!(
                    "sync: '{}' replaced {} backend rows with {}",
                    list_name,
                    report.removed,
                    report.ids.len()
                );
                result.lists_updated.push(list_name);
            }
            Err(e) => {
                log::warn!("sync: merge of '{}' failed: {}", list_name, e);
                result
                    .errors
                    .push(SyncIssue::new(Some(&list_name), SyncStage::Store, e.to_string()));
            }
        }
    }

    result
}

fn merge_into_store(
    store: &EntryStore,
    list_name: &str,
    entries: Vec<ListEntry>,
) -> Result<ReplaceReport, StoreError> {
    let entries = entries
        .into_iter()
        .map(|mut entry| {
            entry.id = None;
            entry.source = Source::Backend;
            entry
        })
        .collect();
    store.replace_entries(list_name, Some(Source::Backend), entries, OnConflict::Skip)
}

fn build_entries(
    list_name: &str,
    records: Vec<Value>,
    version: Option<&str>,
    sync_timestamp: i64,
    issues: &mut Vec<SyncIssue>,
) -> Vec<ListEntry> {
    let mut entries = Vec::with_capacity(records.len());
    for (i, record) in records.into_iter().enumerate() {
        let raw: RawRecord = match serde_json::from_value(record) {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("sync: '{}' record {} malformed: {}", list_name, i, e);
                issues.push(SyncIssue::new(
                    Some(list_name),
                    SyncStage::Entry,
                    format!("record {}: {}", i, e),
                ));
                continue;
            }
        };

        let mut metadata = raw.metadata;
        metadata.sync_timestamp = Some(sync_timestamp);
        if let Some(version) = version {
            metadata.sync_version = Some(version.to_string());
        }
        entries.push(
            ListEntry::new(list_name, raw.domain, raw.pattern_type, Source::Backend)
                .with_metadata(metadata),
        );
    }
    entries
}
