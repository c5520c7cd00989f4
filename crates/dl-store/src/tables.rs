//! redb table definitions for the entry store.
//!
//! `ENTRIES` holds the canonical rows; every other table is an index whose
//! keys end in the entry id so that range scans come back in id order.

use redb::TableDefinition;

/// Canonical entry rows (`ListEntry`, JSON-encoded).
pub const ENTRIES: TableDefinition<u64, &[u8]> = TableDefinition::new("entries");
/// Unique compound key `(list_name, domain)` -> id.
pub const BY_LIST_DOMAIN: TableDefinition<(&str, &str), u64> =
    TableDefinition::new("entries_by_list_domain");
/// `(list_name, id)`; storage order within a list.
pub const BY_LIST: TableDefinition<(&str, u64), ()> = TableDefinition::new("entries_by_list");
/// `(list_name, source, id)`.
pub const BY_LIST_SOURCE: TableDefinition<(&str, &str, u64), ()> =
    TableDefinition::new("entries_by_list_source");
/// `(source, id)`.
pub const BY_SOURCE: TableDefinition<(&str, u64), ()> = TableDefinition::new("entries_by_source");
/// `(domain, id)`; the same pattern across lists.
pub const BY_DOMAIN: TableDefinition<(&str, u64), ()> = TableDefinition::new("entries_by_domain");
/// Store counters.
pub const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

/// Key in [`META`] holding the next id to assign.
pub const NEXT_ID_KEY: &str = "next_id";
