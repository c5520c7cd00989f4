//! Read-side list queries: fetch, find, first match and classification.

use dl_core::{matches_parts, parse_url, ListEntry};

use crate::error::StoreError;
use crate::store::EntryStore;

/// Lookups over one [`EntryStore`].
#[derive(Clone, Copy)]
pub struct ListQuery<'a> {
    store: &'a EntryStore,
}

impl<'a> ListQuery<'a> {
    pub fn new(store: &'a EntryStore) -> Self {
        Self { store }
    }

    pub fn entries(&self, list_name: &str) -> Result<Vec<ListEntry>, StoreError> {
        self.store.get_by_list(list_name)
    }

    pub fn find(&self, list_name: &str, domain: &str) -> Result<Option<ListEntry>, StoreError> {
        self.store.find(list_name, domain)
    }

    /// First entry of `list_name`, in storage order, whose pattern matches `url`.
    ///
    /// Linear scan over the list with the URL parsed once. Entries that
    /// cannot be evaluated (bad regex, unparseable URL) simply do not match.
    pub fn match_first(&self, url: &str, list_name: &str) -> Result<Option<ListEntry>, StoreError> {
        let entries = self.store.get_by_list(list_name)?;
        let parts = match parse_url(url) {
            Ok(parts) => parts,
            Err(e) => {
                log::debug!("no match in '{}': {}", list_name, e);
                return Ok(None);
            }
        };
        Ok(entries
            .into_iter()
            .find(|entry| matches_parts(&parts, &entry.domain, entry.pattern_type)))
    }

    /// First list in `list_names` with an entry matching `url`.
    pub fn classify<S: AsRef<str>>(
        &self,
        url: &str,
        list_names: &[S],
    ) -> Result<Option<(String, ListEntry)>, StoreError> {
        for name in list_names {
            let name = name.as_ref();
            if let Some(entry) = self.match_first(url, name)? {
                return Ok(Some((name.to_string(), entry)));
            }
        }
        Ok(None)
    }
}
