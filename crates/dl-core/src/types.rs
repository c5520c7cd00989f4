//! Core type definitions for domain lists
//!
//! These types are shared by the store, the matcher and the sync engine,
//! and map directly to the persisted JSON row format.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Store-assigned entry identifier.
pub type EntryId = u64;

// =============================================================================
// Pattern Types
// =============================================================================

/// How the `domain` field of an entry is interpreted when matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    /// Same registrable domain (eTLD+1) as the URL host
    Domain,
    /// `*.base` - the base host or any subdomain of it
    SubdomainWildcard,
    /// Byte-for-byte URL equality
    ExactUrl,
    /// `host/path` - host (ignoring `www.`) plus path prefix
    HostPathPrefix,
    /// Regular expression over the full URL
    Regex,
}

impl PatternType {
    /// All pattern types, in declaration order.
    pub const ALL: [PatternType; 5] = [
        Self::Domain,
        Self::SubdomainWildcard,
        Self::ExactUrl,
        Self::HostPathPrefix,
        Self::Regex,
    ];

    /// Wire name of the pattern type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Domain => "domain",
            Self::SubdomainWildcard => "subdomain_wildcard",
            Self::ExactUrl => "exact_url",
            Self::HostPathPrefix => "host_path_prefix",
            Self::Regex => "regex",
        }
    }
}

impl fmt::Display for PatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown pattern type or source name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownName {
    pub kind: &'static str,
    pub value: String,
}

impl FromStr for PatternType {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownName {
                kind: "pattern type",
                value: s.to_string(),
            })
    }
}

// =============================================================================
// Entry Sources
// =============================================================================

/// Ownership class of an entry. Controls what a sync may replace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Remote-authoritative, replaced wholesale on sync
    Backend,
    /// Added manually, never touched by sync
    User,
    /// Derived locally, never touched by sync
    Generated,
}

impl Source {
    pub const ALL: [Source; 3] = [Self::Backend, Self::User, Self::Generated];

    /// Wire name of the source.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Backend => "backend",
            Self::User => "user",
            Self::Generated => "generated",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|src| src.as_str() == s)
            .ok_or_else(|| UnknownName {
                kind: "source",
                value: s.to_string(),
            })
    }
}

// =============================================================================
// Entry Metadata
// =============================================================================

/// Metadata keys that have a typed field and never live in `extra`.
pub const RESERVED_METADATA_KEYS: [&str; 7] = [
    "category",
    "description",
    "tags",
    "created_at",
    "updated_at",
    "sync_version",
    "sync_timestamp",
];

/// Open metadata mapping attached to every entry.
///
/// Known keys are typed; anything else a caller supplies is kept in `extra`
/// and written back out unchanged. Typed fields are lenient on input: a
/// `null` reads as the default and `sync_version` may be a number.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "BTreeSet::is_empty"
    )]
    pub tags: BTreeSet<String>,
    /// Epoch milliseconds, assigned by the store on create
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: i64,
    /// Epoch milliseconds, refreshed by the store on every mutation
    #[serde(default, deserialize_with = "null_as_default")]
    pub updated_at: i64,
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub sync_version: Option<String>,
    /// Epoch milliseconds of the sync that inserted this entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_timestamp: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EntryMetadata {
    /// Copy of the metadata with store-managed timestamps cleared.
    pub fn without_timestamps(&self) -> Self {
        Self {
            created_at: 0,
            updated_at: 0,
            ..self.clone()
        }
    }

    /// Move reserved keys out of `extra` so each key is serialized once.
    ///
    /// A value of the right shape replaces the typed field and `null` clears
    /// it. `created_at`/`updated_at` belong to the store and are dropped, as
    /// is anything of the wrong shape.
    pub fn absorb_reserved_keys(&mut self) {
        for key in RESERVED_METADATA_KEYS {
            let Some(value) = self.extra.remove(key) else {
                continue;
            };
            let absorbed = match (key, value) {
                ("category", Value::String(s)) => {
                    self.category = Some(s);
                    true
                }
                ("category", Value::Null) => {
                    self.category = None;
                    true
                }
                ("description", Value::String(s)) => {
                    self.description = Some(s);
                    true
                }
                ("description", Value::Null) => {
                    self.description = None;
                    true
                }
                ("tags", Value::Null) => {
                    self.tags.clear();
                    true
                }
                ("tags", Value::Array(items)) => {
                    let tags: Option<BTreeSet<String>> =
                        items.into_iter().map(|v| v.as_str().map(str::to_string)).collect();
                    match tags {
                        Some(tags) => {
                            self.tags = tags;
                            true
                        }
                        None => false,
                    }
                }
                ("sync_version", Value::String(s)) => {
                    self.sync_version = Some(s);
                    true
                }
                ("sync_version", Value::Number(n)) => {
                    self.sync_version = Some(n.to_string());
                    true
                }
                ("sync_version", Value::Null) => {
                    self.sync_version = None;
                    true
                }
                ("sync_timestamp", Value::Number(n)) if n.is_i64() => {
                    self.sync_timestamp = n.as_i64();
                    true
                }
                ("sync_timestamp", Value::Null) => {
                    self.sync_timestamp = None;
                    true
                }
                _ => false,
            };
            if !absorbed {
                log::debug!("dropped reserved metadata key '{}' from extra", key);
            }
        }
    }
}

/// Deserialize `null` as `T::default()`.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number, got {}",
            other
        ))),
    }
}

// =============================================================================
// List Entry
// =============================================================================

/// One pattern belonging to one named list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListEntry {
    /// Absent until the entry is persisted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntryId>,
    pub list_name: String,
    /// Pattern value; meaning depends on `pattern_type`
    pub domain: String,
    pub pattern_type: PatternType,
    pub source: Source,
    #[serde(default)]
    pub metadata: EntryMetadata,
}

impl ListEntry {
    /// Create an unsaved entry with empty metadata.
    pub fn new(
        list_name: impl Into<String>,
        domain: impl Into<String>,
        pattern_type: PatternType,
        source: Source,
    ) -> Self {
        Self {
            id: None,
            list_name: list_name.into(),
            domain: domain.into(),
            pattern_type,
            source,
            metadata: EntryMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: EntryMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}
