//! Static catalogs with sparse per-owner overrides.
//!
//! A [`Catalog`] is an immutable, ordered list of code-defined entries,
//! injected at startup. Owners customize entries through override rows
//! holding a full settings snapshot: the first write seeds the row from
//! catalog defaults and applies the patch on top, later writes patch only
//! the supplied fields. Reads overlay those rows on the catalog in
//! declaration order, so output is stable regardless of which entries
//! were customized.

use std::collections::HashMap;

use crate::error::{TenantryError, TenantryResult};

/// An entry addressable by a stable key.
pub trait CatalogEntry: Send + Sync {
    fn key(&self) -> &str;
}

/// A catalog entry whose settings an owner may override.
pub trait Overridable: CatalogEntry {
    /// Complete set of values an override row stores.
    type Settings: Clone + Send + Sync;
    /// Partial update; absent fields are left untouched.
    type Patch: Send + Sync;
    /// Merged result handed to callers.
    type View;

    /// Catalog defaults, used to seed a new override row.
    fn defaults(&self) -> Self::Settings;

    /// Reject out-of-range values before anything is persisted.
    fn validate_patch(patch: &Self::Patch) -> TenantryResult<()>;

    fn apply_patch(settings: &mut Self::Settings, patch: &Self::Patch);

    /// `None` means the owner never customized this entry.
    fn view(&self, settings: Option<&Self::Settings>) -> Self::View;
}

#[derive(Debug, Clone)]
pub struct Catalog<E> {
    entries: Vec<E>,
    index: HashMap<String, usize>,
}

impl<E: CatalogEntry> Catalog<E> {
    /// Build a catalog, keeping the given order. Keys must be unique.
    pub fn new(entries: Vec<E>) -> TenantryResult<Self> {
        let mut index = HashMap::with_capacity(entries.len());
        for (pos, entry) in entries.iter().enumerate() {
            if index.insert(entry.key().to_string(), pos).is_some() {
                return Err(TenantryError::Internal(format!(
                    "duplicate catalog key: {}",
                    entry.key()
                )));
            }
        }
        Ok(Self { entries, index })
    }

    pub fn get(&self, key: &str) -> Option<&E> {
        self.index.get(key).map(|&pos| &self.entries[pos])
    }

    /// Like [`get`](Self::get) but with a `NotFound` error.
    pub fn require(&self, key: &str) -> TenantryResult<&E> {
        self.get(key)
            .ok_or_else(|| TenantryError::not_found("catalog entry", key))
    }

    pub fn entries(&self) -> &[E] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<E: Overridable> Catalog<E> {
    /// Effective views for every catalog entry, in declaration order.
    ///
    /// Overrides whose key is not in the catalog are ignored.
    pub fn effective<'a, I>(&self, overrides: I) -> Vec<E::View>
    where
        I: IntoIterator<Item = (&'a str, &'a E::Settings)>,
        E::Settings: 'a,
    {
        let by_key: HashMap<&str, &E::Settings> = overrides.into_iter().collect();
        self.entries
            .iter()
            .map(|entry| entry.view(by_key.get(entry.key()).copied()))
            .collect()
    }

    /// Settings to persist after applying `patch` to `existing`, seeding
    /// from catalog defaults when the owner has no override yet.
    pub fn patched(
        &self,
        key: &str,
        existing: Option<&E::Settings>,
        patch: &E::Patch,
    ) -> TenantryResult<E::Settings> {
        let entry = self.require(key)?;
        E::validate_patch(patch)?;
        let mut settings = match existing {
            Some(s) => s.clone(),
            None => entry.defaults(),
        };
        E::apply_patch(&mut settings, patch);
        Ok(settings)
    }
}
