//! Entry Store backed by redb.
//!
//! Every public operation runs in exactly one redb transaction, so a single
//! create, bulk create, update or scoped delete is atomic with respect to
//! every other operation on the same database file.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use dl_core::{EntryId, ListEntry, PatternType, Source};
use redb::{ReadableDatabase, ReadableTable, WriteTransaction};
use serde_json::{Map, Value};

use crate::error::StoreError;
use crate::tables::*;

// =============================================================================
// Update and Replace Types
// =============================================================================

/// Metadata fields to merge into an existing entry. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct MetadataPatch {
    pub category: Option<String>,
    pub description: Option<String>,
    pub tags: Option<BTreeSet<String>>,
    /// Merged key by key into the entry's additional metadata
    pub extra: Map<String, Value>,
}

/// Partial update for one entry.
///
/// `list_name`, `source`, `created_at` and the id are not updatable.
#[derive(Debug, Clone, Default)]
pub struct EntryUpdate {
    pub domain: Option<String>,
    pub pattern_type: Option<PatternType>,
    pub metadata: MetadataPatch,
}

/// What [`EntryStore::replace_entries`] does with an entry it cannot insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnConflict {
    /// Roll back the whole replacement
    Abort,
    /// Leave the entry out and report it
    Skip,
}

/// An entry left out of a replacement.
#[derive(Debug)]
pub struct RejectedEntry {
    pub domain: String,
    pub error: StoreError,
}

/// Outcome of a committed replacement.
#[derive(Debug, Default)]
pub struct ReplaceReport {
    /// Rows deleted before inserting
    pub removed: usize,
    /// Ids of inserted rows, in input order
    pub ids: Vec<EntryId>,
    pub rejected: Vec<RejectedEntry>,
}

impl StoreError {
    /// Errors caused by the entry itself rather than by the database.
    pub fn is_entry_error(&self) -> bool {
        matches!(self, Self::DuplicateKey { .. } | Self::InvalidEntry(_))
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// =============================================================================
// Entry Store
// =============================================================================

/// Durable, indexed storage for list entries.
#[derive(Clone)]
pub struct EntryStore {
    db: Arc<redb::Database>,
}

impl EntryStore {
    /// Open (or create) a store at `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or the tables cannot be
    /// created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = redb::Database::create(path.as_ref())?;
        Self::from_shared(Arc::new(db))
    }

    /// Wrap an already opened database, creating missing tables.
    pub fn from_shared(db: Arc<redb::Database>) -> Result<Self, StoreError> {
        let write_txn = db.begin_write()?;
        {
            let _ = Tables::open(&write_txn)?;
        }
        write_txn.commit()?;
        Ok(Self { db })
    }

    /// Insert one entry and return its new id.
    ///
    /// `created_at` and `updated_at` are overwritten with the current time.
    ///
    /// # Errors
    /// [`StoreError::DuplicateKey`] if `(list_name, domain)` already exists.
    pub fn create(&self, entry: ListEntry) -> Result<EntryId, StoreError> {
        let write_txn = self.db.begin_write()?;
        let id = {
            let mut tables = Tables::open(&write_txn)?;
            tables.insert(entry, now_millis())?
        };
        write_txn.commit()?;
        Ok(id)
    }

    /// Insert a batch of entries in one transaction.
    ///
    /// The batch is all-or-nothing: the first rejected entry aborts the call
    /// and its error is returned. Ids come back in input order.
    pub fn bulk_create(&self, entries: Vec<ListEntry>) -> Result<Vec<EntryId>, StoreError> {
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let now = now_millis();
        let write_txn = self.db.begin_write()?;
        let ids = {
            let mut tables = Tables::open(&write_txn)?;
            let mut ids = Vec::with_capacity(entries.len());
            for entry in entries {
                ids.push(tables.insert(entry, now)?);
            }
            ids
        };
        write_txn.commit()?;
        Ok(ids)
    }

    /// Fetch one entry by id.
    pub fn get(&self, id: EntryId) -> Result<Option<ListEntry>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let entries = read_txn.open_table(ENTRIES)?;
        load_entry(&entries, id)
    }

    /// All entries of a list, in storage (id) order.
    pub fn get_by_list(&self, list_name: &str) -> Result<Vec<ListEntry>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let by_list = read_txn.open_table(BY_LIST)?;
        let entries = read_txn.open_table(ENTRIES)?;
        let ids = ids_for_key(&by_list, list_name)?;
        load_entries(&entries, &ids)
    }

    /// Entries of a list owned by one source.
    pub fn get_by_list_and_source(
        &self,
        list_name: &str,
        source: Source,
    ) -> Result<Vec<ListEntry>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let by_list_source = read_txn.open_table(BY_LIST_SOURCE)?;
        let entries = read_txn.open_table(ENTRIES)?;
        let ids = ids_for_list_source(&by_list_source, list_name, source)?;
        load_entries(&entries, &ids)
    }

    /// Entries owned by one source, across all lists.
    pub fn get_by_source(&self, source: Source) -> Result<Vec<ListEntry>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let by_source = read_txn.open_table(BY_SOURCE)?;
        let entries = read_txn.open_table(ENTRIES)?;
        let ids = ids_for_key(&by_source, source.as_str())?;
        load_entries(&entries, &ids)
    }

    /// Exact lookup by `(list_name, domain)`.
    pub fn find(&self, list_name: &str, domain: &str) -> Result<Option<ListEntry>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let by_list_domain = read_txn.open_table(BY_LIST_DOMAIN)?;
        let entries = read_txn.open_table(ENTRIES)?;
        let id = match by_list_domain.get((list_name, domain))? {
            Some(guard) => guard.value(),
            None => return Ok(None),
        };
        load_entry(&entries, id)
    }

    /// Every entry using `domain` as its pattern, whatever the list.
    pub fn find_domain(&self, domain: &str) -> Result<Vec<ListEntry>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let by_domain = read_txn.open_table(BY_DOMAIN)?;
        let entries = read_txn.open_table(ENTRIES)?;
        let ids = ids_for_key(&by_domain, domain)?;
        load_entries(&entries, &ids)
    }

    /// Number of entries in a list.
    pub fn count(&self, list_name: &str) -> Result<usize, StoreError> {
        let read_txn = self.db.begin_read()?;
        let by_list = read_txn.open_table(BY_LIST)?;
        Ok(ids_for_key(&by_list, list_name)?.len())
    }

    /// Merge `update` into an existing entry and return the result.
    ///
    /// Metadata fields are merged, not replaced; `updated_at` is refreshed.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if `id` does not exist, or
    /// [`StoreError::DuplicateKey`] if a new `domain` is already used in the
    /// entry's list.
    pub fn update(&self, id: EntryId, update: EntryUpdate) -> Result<ListEntry, StoreError> {
        let write_txn = self.db.begin_write()?;
        let updated = {
            let mut tables = Tables::open(&write_txn)?;
            let Some(mut entry) = load_entry(&tables.entries, id)? else {
                return Err(StoreError::NotFound(id));
            };

            if let Some(domain) = update.domain.as_deref() {
                if domain.is_empty() {
                    return Err(StoreError::InvalidEntry("domain must not be empty".to_string()));
                }
                if domain != entry.domain
                    && tables
                        .by_list_domain
                        .get((entry.list_name.as_str(), domain))?
                        .is_some()
                {
                    return Err(StoreError::DuplicateKey {
                        list_name: entry.list_name.clone(),
                        domain: domain.to_string(),
                    });
                }
            }

            tables.unindex(&entry, id)?;
            apply_update(&mut entry, update);
            entry.metadata.absorb_reserved_keys();
            entry.metadata.updated_at = now_millis();
            tables.write_row(&entry, id)?;
            entry
        };
        write_txn.commit()?;
        Ok(updated)
    }

    /// Delete one entry. A missing id is not an error.
    pub fn delete(&self, id: EntryId) -> Result<(), StoreError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut tables = Tables::open(&write_txn)?;
            if tables.remove(id)?.is_none() {
                log::debug!("delete: entry {} already absent", id);
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Delete every entry of a list, or only those owned by `source`.
    ///
    /// Returns the number of rows removed.
    pub fn delete_all(&self, list_name: &str, source: Option<Source>) -> Result<usize, StoreError> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut tables = Tables::open(&write_txn)?;
            tables.remove_scoped(list_name, source)?
        };
        write_txn.commit()?;
        Ok(removed)
    }

    /// Replace the scoped contents of a list in one transaction.
    ///
    /// Deletes the entries of `list_name` (all of them, or only those owned
    /// by `scope`) and inserts `entries`. Nothing is visible to readers
    /// until both halves have been applied. With [`OnConflict::Abort`] the
    /// first rejected entry rolls everything back; with [`OnConflict::Skip`]
    /// it is left out and listed in the report. Database failures always
    /// roll back.
    pub fn replace_entries(
        &self,
        list_name: &str,
        scope: Option<Source>,
        entries: Vec<ListEntry>,
        on_conflict: OnConflict,
    ) -> Result<ReplaceReport, StoreError> {
        let now = now_millis();
        let write_txn = self.db.begin_write()?;
        let report = {
            let mut tables = Tables::open(&write_txn)?;
            let mut report = ReplaceReport {
                removed: tables.remove_scoped(list_name, scope)?,
                ..Default::default()
            };

            for entry in entries {
                let domain = entry.domain.clone();
                let result = if entry.list_name == list_name {
                    tables.insert(entry, now)
                } else {
                    Err(StoreError::InvalidEntry(format!(
                        "entry '{}' belongs to list '{}', not '{}'",
                        domain, entry.list_name, list_name
                    )))
                };
                match result {
                    Ok(id) => report.ids.push(id),
                    Err(error) if on_conflict == OnConflict::Skip && error.is_entry_error() => {
                        report.rejected.push(RejectedEntry { domain, error });
                    }
                    Err(error) => return Err(error),
                }
            }
            report
        };
        write_txn.commit()?;
        Ok(report)
    }

    /// Distinct list names, in lexicographic order.
    pub fn list_names(&self) -> Result<BTreeSet<String>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let by_list = read_txn.open_table(BY_LIST)?;
        let mut names = BTreeSet::new();
        for item in by_list.iter()? {
            let (key, _) = item?;
            let (name, _) = key.value();
            if !names.contains(name) {
                names.insert(name.to_string());
            }
        }
        Ok(names)
    }
}

fn apply_update(entry: &mut ListEntry, update: EntryUpdate) {
    if let Some(domain) = update.domain {
        entry.domain = domain;
    }
    if let Some(pattern_type) = update.pattern_type {
        entry.pattern_type = pattern_type;
    }

    let patch = update.metadata;
    let meta = &mut entry.metadata;
    if patch.category.is_some() {
        meta.category = patch.category;
    }
    if patch.description.is_some() {
        meta.description = patch.description;
    }
    if let Some(tags) = patch.tags {
        meta.tags = tags;
    }
    for (key, value) in patch.extra {
        meta.extra.insert(key, value);
    }
}

fn validate(entry: &ListEntry) -> Result<(), StoreError> {
    if entry.list_name.is_empty() {
        return Err(StoreError::InvalidEntry("list_name must not be empty".to_string()));
    }
    if entry.domain.is_empty() {
        return Err(StoreError::InvalidEntry(format!(
            "domain must not be empty (list '{}')",
            entry.list_name
        )));
    }
    Ok(())
}

// =============================================================================
// Table Helpers
// =============================================================================

/// All store tables opened inside one write transaction.
struct Tables<'txn> {
    entries: redb::Table<'txn, u64, &'static [u8]>,
    by_list_domain: redb::Table<'txn, (&'static str, &'static str), u64>,
    by_list: redb::Table<'txn, (&'static str, u64), ()>,
    by_list_source: redb::Table<'txn, (&'static str, &'static str, u64), ()>,
    by_source: redb::Table<'txn, (&'static str, u64), ()>,
    by_domain: redb::Table<'txn, (&'static str, u64), ()>,
    meta: redb::Table<'txn, &'static str, u64>,
}

impl<'txn> Tables<'txn> {
    fn open(txn: &'txn WriteTransaction) -> Result<Self, StoreError> {
        Ok(Self {
            entries: txn.open_table(ENTRIES)?,
            by_list_domain: txn.open_table(BY_LIST_DOMAIN)?,
            by_list: txn.open_table(BY_LIST)?,
            by_list_source: txn.open_table(BY_LIST_SOURCE)?,
            by_source: txn.open_table(BY_SOURCE)?,
            by_domain: txn.open_table(BY_DOMAIN)?,
            meta: txn.open_table(META)?,
        })
    }

    fn next_id(&mut self) -> Result<EntryId, StoreError> {
        let current = self.meta.get(NEXT_ID_KEY)?.map(|guard| guard.value()).unwrap_or(1);
        self.meta.insert(NEXT_ID_KEY, current + 1)?;
        Ok(current)
    }

    fn insert(&mut self, mut entry: ListEntry, now: i64) -> Result<EntryId, StoreError> {
        validate(&entry)?;
        if self
            .by_list_domain
            .get((entry.list_name.as_str(), entry.domain.as_str()))?
            .is_some()
        {
            return Err(StoreError::DuplicateKey {
                list_name: entry.list_name,
                domain: entry.domain,
            });
        }

        let id = self.next_id()?;
        entry.metadata.absorb_reserved_keys();
        entry.metadata.created_at = now;
        entry.metadata.updated_at = now;
        self.write_row(&entry, id)?;
        Ok(id)
    }

    /// Write the canonical row and all index rows for `entry`.
    fn write_row(&mut self, entry: &ListEntry, id: EntryId) -> Result<(), StoreError> {
        let mut row = entry.clone();
        row.id = Some(id);
        let encoded = serde_json::to_vec(&row)?;
        self.entries.insert(id, encoded.as_slice())?;

        let list = entry.list_name.as_str();
        let domain = entry.domain.as_str();
        let source = entry.source.as_str();
        self.by_list_domain.insert((list, domain), id)?;
        self.by_list.insert((list, id), ())?;
        self.by_list_source.insert((list, source, id), ())?;
        self.by_source.insert((source, id), ())?;
        self.by_domain.insert((domain, id), ())?;
        Ok(())
    }

    fn unindex(&mut self, entry: &ListEntry, id: EntryId) -> Result<(), StoreError> {
        let list = entry.list_name.as_str();
        let domain = entry.domain.as_str();
        let source = entry.source.as_str();
        let _ = self.by_list_domain.remove((list, domain))?;
        let _ = self.by_list.remove((list, id))?;
        let _ = self.by_list_source.remove((list, source, id))?;
        let _ = self.by_source.remove((source, id))?;
        let _ = self.by_domain.remove((domain, id))?;
        Ok(())
    }

    fn remove(&mut self, id: EntryId) -> Result<Option<ListEntry>, StoreError> {
        let Some(entry) = load_entry(&self.entries, id)? else {
            return Ok(None);
        };
        self.unindex(&entry, id)?;
        let _ = self.entries.remove(id)?;
        Ok(Some(entry))
    }

    fn remove_scoped(
        &mut self,
        list_name: &str,
        source: Option<Source>,
    ) -> Result<usize, StoreError> {
        let ids = match source {
            Some(source) => ids_for_list_source(&self.by_list_source, list_name, source)?,
            None => ids_for_key(&self.by_list, list_name)?,
        };

        let mut removed = 0;
        for id in ids {
            if self.remove(id)?.is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn load_entry(
    table: &impl ReadableTable<u64, &'static [u8]>,
    id: EntryId,
) -> Result<Option<ListEntry>, StoreError> {
    let Some(guard) = table.get(id)? else {
        return Ok(None);
    };
    let mut entry: ListEntry = serde_json::from_slice(guard.value())?;
    entry.id = Some(id);
    Ok(Some(entry))
}

fn load_entries(
    table: &impl ReadableTable<u64, &'static [u8]>,
    ids: &[EntryId],
) -> Result<Vec<ListEntry>, StoreError> {
    let mut out = Vec::with_capacity(ids.len());
    for &id in ids {
        match load_entry(table, id)? {
            Some(entry) => out.push(entry),
            None => log::warn!("index refers to missing entry {}", id),
        }
    }
    Ok(out)
}

/// Ids stored under `(key, id)` index rows, in id order.
fn ids_for_key(
    table: &impl ReadableTable<(&'static str, u64), ()>,
    key: &str,
) -> Result<Vec<EntryId>, StoreError> {
    let mut ids = Vec::new();
    for item in table.range((key, 0u64)..=(key, u64::MAX))? {
        let (index_key, _) = item?;
        ids.push(index_key.value().1);
    }
    Ok(ids)
}

fn ids_for_list_source(
    table: &impl ReadableTable<(&'static str, &'static str, u64), ()>,
    list_name: &str,
    source: Source,
) -> Result<Vec<EntryId>, StoreError> {
    let source = source.as_str();
    let mut ids = Vec::new();
    for item in table.range((list_name, source, 0u64)..=(list_name, source, u64::MAX))? {
        let (index_key, _) = item?;
        ids.push(index_key.value().2);
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dl_core::EntryMetadata;
    use tempfile::TempDir;

    fn setup_store() -> (EntryStore, TempDir) {
        let temp = TempDir::new().expect("temp dir");
        let store = EntryStore::open(temp.path().join("lists.redb")).expect("open store");
        (store, temp)
    }

    fn entry(list: &str, domain: &str, source: Source) -> ListEntry {
        ListEntry::new(list, domain, PatternType::Domain, source)
    }

    #[test]
    fn create_assigns_id_and_timestamps() {
        let (store, _temp) = setup_store();
        let mut input = entry("blocklist", "example.com", Source::User);
        input.metadata.created_at = 5;

        let id = store.create(input).expect("create");
        let stored = store.get(id).expect("get").expect("entry exists");
        assert_eq!(stored.id, Some(id));
        assert!(stored.metadata.created_at > 5);
        assert_eq!(stored.metadata.created_at, stored.metadata.updated_at);
    }

    #[test]
    fn create_rejects_duplicate_list_and_domain() {
        let (store, _temp) = setup_store();
        store.create(entry("blocklist", "example.com", Source::User)).expect("create");

        let err = store
            .create(entry("blocklist", "example.com", Source::Backend))
            .expect_err("duplicate must fail");
        assert!(matches!(err, StoreError::DuplicateKey { .. }), "unexpected: {err}");
        assert_eq!(store.count("blocklist").expect("count"), 1);

        // Same domain in another list is fine.
        store.create(entry("allowlist", "example.com", Source::User)).expect("other list");
    }

    #[test]
    fn create_rejects_empty_fields() {
        let (store, _temp) = setup_store();
        assert!(matches!(
            store.create(entry("", "example.com", Source::User)),
            Err(StoreError::InvalidEntry(_))
        ));
        assert!(matches!(
            store.create(entry("blocklist", "", Source::User)),
            Err(StoreError::InvalidEntry(_))
        ));
    }

    #[test]
    fn get_by_list_returns_storage_order() {
        let (store, _temp) = setup_store();
        for domain in ["c.com", "a.com", "b.com"] {
            store.create(entry("blocklist", domain, Source::User)).expect("create");
        }
        store.create(entry("other", "z.com", Source::User)).expect("create");

        let domains: Vec<String> = store
            .get_by_list("blocklist")
            .expect("list")
            .into_iter()
            .map(|e| e.domain)
            .collect();
        assert_eq!(domains, ["c.com", "a.com", "b.com"]);
        assert!(store.get_by_list("missing").expect("list").is_empty());
    }

    #[test]
    fn source_scoped_queries() {
        let (store, _temp) = setup_store();
        store.create(entry("blocklist", "a.com", Source::Backend)).expect("create");
        store.create(entry("blocklist", "b.com", Source::User)).expect("create");
        store.create(entry("blocklist", "c.com", Source::Generated)).expect("create");
        store.create(entry("other", "d.com", Source::Backend)).expect("create");

        let backend = store
            .get_by_list_and_source("blocklist", Source::Backend)
            .expect("query");
        assert_eq!(backend.len(), 1);
        assert_eq!(backend[0].domain, "a.com");

        assert_eq!(store.get_by_source(Source::Backend).expect("query").len(), 2);
    }

    #[test]
    fn find_by_compound_key_and_domain() {
        let (store, _temp) = setup_store();
        store.create(entry("blocklist", "a.com", Source::User)).expect("create");
        store.create(entry("category:shopping", "a.com", Source::Backend)).expect("create");

        let found = store.find("blocklist", "a.com").expect("find").expect("present");
        assert_eq!(found.source, Source::User);
        assert!(store.find("blocklist", "b.com").expect("find").is_none());
        assert_eq!(store.find_domain("a.com").expect("find").len(), 2);
    }

    #[test]
    fn update_merges_metadata_and_keeps_created_at() {
        let (store, _temp) = setup_store();
        let mut meta = EntryMetadata {
            category: Some("ads".to_string()),
            description: Some("old".to_string()),
            ..Default::default()
        };
        meta.extra.insert("keep".to_string(), Value::from(true));
        let id = store
            .create(entry("blocklist", "a.com", Source::User).with_metadata(meta))
            .expect("create");
        let before = store.get(id).expect("get").expect("present");

        let mut update = EntryUpdate::default();
        update.metadata.description = Some("new".to_string());
        update.metadata.extra.insert("note".to_string(), Value::from("x"));
        let updated = store.update(id, update).expect("update");

        assert_eq!(updated.id, Some(id));
        assert_eq!(updated.metadata.category.as_deref(), Some("ads"));
        assert_eq!(updated.metadata.description.as_deref(), Some("new"));
        assert_eq!(updated.metadata.extra.get("keep"), Some(&Value::from(true)));
        assert_eq!(updated.metadata.extra.get("note"), Some(&Value::from("x")));
        assert_eq!(updated.metadata.created_at, before.metadata.created_at);
        assert!(updated.metadata.updated_at >= before.metadata.updated_at);
        assert_eq!(store.get(id).expect("get").expect("present"), updated);
    }

    #[test]
    fn reserved_keys_in_extra_do_not_corrupt_rows() {
        let (store, _temp) = setup_store();
        let mut meta = EntryMetadata::default();
        meta.extra.insert("created_at".to_string(), Value::from(1));
        meta.extra.insert("category".to_string(), Value::from("ads"));
        let id = store
            .create(entry("blocklist", "a.com", Source::User).with_metadata(meta))
            .expect("create");
        store.create(entry("blocklist", "b.com", Source::User)).expect("create");

        let created = store.get(id).expect("get").expect("present");
        assert!(created.metadata.created_at > 1);
        assert_eq!(created.metadata.category.as_deref(), Some("ads"));
        assert!(created.metadata.extra.is_empty());

        let mut update = EntryUpdate::default();
        update.metadata.extra.insert("updated_at".to_string(), Value::from(1));
        update.metadata.extra.insert("created_at".to_string(), Value::from(1));
        update.metadata.extra.insert("tags".to_string(), Value::from(vec!["x"]));
        let updated = store.update(id, update).expect("update");

        assert_eq!(updated.metadata.created_at, created.metadata.created_at);
        assert!(updated.metadata.updated_at >= created.metadata.updated_at);
        assert_eq!(updated.metadata.tags.len(), 1);
        assert_eq!(store.get(id).expect("get").expect("present"), updated);
        assert_eq!(store.get_by_list("blocklist").expect("list").len(), 2);
    }

    #[test]
    fn update_domain_reindexes_and_checks_uniqueness() {
        let (store, _temp) = setup_store();
        let id = store.create(entry("blocklist", "a.com", Source::User)).expect("create");
        store.create(entry("blocklist", "b.com", Source::User)).expect("create");

        let taken = EntryUpdate {
            domain: Some("b.com".to_string()),
            ..Default::default()
        };
        assert!(matches!(store.update(id, taken), Err(StoreError::DuplicateKey { .. })));

        let rename = EntryUpdate {
            domain: Some("c.com".to_string()),
            pattern_type: Some(PatternType::SubdomainWildcard),
            ..Default::default()
        };
        store.update(id, rename).expect("rename");
        assert!(store.find("blocklist", "a.com").expect("find").is_none());
        let renamed = store.find("blocklist", "c.com").expect("find").expect("present");
        assert_eq!(renamed.id, Some(id));
        assert_eq!(renamed.pattern_type, PatternType::SubdomainWildcard);
        assert_eq!(store.find_domain("a.com").expect("find").len(), 0);
    }

    #[test]
    fn update_missing_id_is_not_found() {
        let (store, _temp) = setup_store();
        let err = store.update(42, EntryUpdate::default()).expect_err("missing");
        assert!(matches!(err, StoreError::NotFound(42)));
    }

    #[test]
    fn delete_is_idempotent() {
        let (store, _temp) = setup_store();
        let id = store.create(entry("blocklist", "a.com", Source::User)).expect("create");
        store.delete(id).expect("delete");
        store.delete(id).expect("second delete");
        assert!(store.get(id).expect("get").is_none());
        // The key is free again.
        store.create(entry("blocklist", "a.com", Source::User)).expect("recreate");
    }

    #[test]
    fn delete_all_scoped_by_source() {
        let (store, _temp) = setup_store();
        store.create(entry("blocklist", "a.com", Source::Backend)).expect("create");
        store.create(entry("blocklist", "b.com", Source::Backend)).expect("create");
        store.create(entry("blocklist", "c.com", Source::User)).expect("create");
        store.create(entry("other", "d.com", Source::Backend)).expect("create");

        assert_eq!(store.delete_all("blocklist", Some(Source::Backend)).expect("delete"), 2);
        let left = store.get_by_list("blocklist").expect("list");
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].source, Source::User);
        assert_eq!(store.count("other").expect("count"), 1);

        assert_eq!(store.delete_all("blocklist", None).expect("delete"), 1);
        assert_eq!(store.count("blocklist").expect("count"), 0);
    }

    #[test]
    fn bulk_create_preserves_input_order() {
        let (store, _temp) = setup_store();
        let ids = store
            .bulk_create(vec![
                entry("blocklist", "e1.com", Source::Backend),
                entry("blocklist", "e2.com", Source::Backend),
                entry("blocklist", "e3.com", Source::Backend),
            ])
            .expect("bulk create");
        assert_eq!(ids.len(), 3);
        for (id, domain) in ids.iter().zip(["e1.com", "e2.com", "e3.com"]) {
            assert_eq!(store.get(*id).expect("get").expect("present").domain, domain);
        }
    }

    #[test]
    fn bulk_create_empty_is_noop() {
        let (store, _temp) = setup_store();
        assert!(store.bulk_create(Vec::new()).expect("empty").is_empty());
    }

    #[test]
    fn bulk_create_is_all_or_nothing() {
        let (store, _temp) = setup_store();
        store.create(entry("blocklist", "taken.com", Source::User)).expect("create");

        let err = store
            .bulk_create(vec![
                entry("blocklist", "fresh.com", Source::Backend),
                entry("blocklist", "taken.com", Source::Backend),
            ])
            .expect_err("duplicate member");
        assert!(matches!(
            err,
            StoreError::DuplicateKey { ref domain, .. } if domain == "taken.com"
        ));
        assert!(store.find("blocklist", "fresh.com").expect("find").is_none());
    }

    #[test]
    fn replace_entries_skip_keeps_other_sources() {
        let (store, _temp) = setup_store();
        store.create(entry("blocklist", "old.com", Source::Backend)).expect("create");
        store.create(entry("blocklist", "mine.com", Source::User)).expect("create");

        let report = store
            .replace_entries(
                "blocklist",
                Some(Source::Backend),
                vec![
                    entry("blocklist", "new.com", Source::Backend),
                    entry("blocklist", "mine.com", Source::Backend),
                    entry("elsewhere", "x.com", Source::Backend),
                ],
                OnConflict::Skip,
            )
            .expect("replace");

        assert_eq!(report.removed, 1);
        assert_eq!(report.ids.len(), 1);
        assert_eq!(report.rejected.len(), 2);
        assert_eq!(report.rejected[0].domain, "mine.com");
        assert!(store.find("blocklist", "old.com").expect("find").is_none());
        assert_eq!(
            store.find("blocklist", "mine.com").expect("find").expect("present").source,
            Source::User
        );
        assert!(store.find("blocklist", "new.com").expect("find").is_some());
    }

    #[test]
    fn replace_entries_abort_rolls_back_the_delete() {
        let (store, _temp) = setup_store();
        store.create(entry("blocklist", "keep.com", Source::User)).expect("create");

        let err = store
            .replace_entries(
                "blocklist",
                None,
                vec![
                    entry("blocklist", "dup.com", Source::User),
                    entry("blocklist", "dup.com", Source::User),
                ],
                OnConflict::Abort,
            )
            .expect_err("duplicate aborts");
        assert!(matches!(err, StoreError::DuplicateKey { .. }));

        let left = store.get_by_list("blocklist").expect("list");
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].domain, "keep.com");
    }

    #[test]
    fn list_names_are_sorted_and_distinct() {
        let (store, _temp) = setup_store();
        store.create(entry("zeta", "a.com", Source::User)).expect("create");
        store.create(entry("alpha", "a.com", Source::User)).expect("create");
        store.create(entry("alpha", "b.com", Source::User)).expect("create");

        let names: Vec<String> = store.list_names().expect("names").into_iter().collect();
        assert_eq!(names, ["alpha", "zeta"]);

        store.delete_all("zeta", None).expect("clear");
        let names: Vec<String> = store.list_names().expect("names").into_iter().collect();
        assert_eq!(names, ["alpha"]);
    }

    #[test]
    fn entries_survive_reopen() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("lists.redb");
        let id = {
            let store = EntryStore::open(&path).expect("open");
            store.create(entry("blocklist", "a.com", Source::User)).expect("create")
        };

        let store = EntryStore::open(&path).expect("reopen");
        assert_eq!(store.get(id).expect("get").expect("present").domain, "a.com");
        let next = store.create(entry("blocklist", "b.com", Source::User)).expect("create");
        assert!(next > id);
    }
}
