//! Domain Lists Core Library
//!
//! Shared data model and the stateless pattern matcher used to classify
//! URLs against named lists of domain patterns.
//!
//! # Modules
//!
//! - `types`: List entries, pattern types, sources and metadata
//! - `psl`: Public Suffix List lookups for registrable-domain extraction
//! - `url`: URL and `host/path` pattern parsing helpers
//! - `matcher`: The five pattern-matching strategies

pub mod matcher;
pub mod psl;
pub mod types;
pub mod url;

// Re-export commonly used types
pub use matcher::{
    evaluate, evaluate_parts, matches, matches_parts, matches_raw, parse_url, MatchError,
};
pub use psl::{init_psl, load_psl, registrable_domain};
pub use types::{EntryId, EntryMetadata, ListEntry, PatternType, Source};
