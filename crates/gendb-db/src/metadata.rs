//! Metadata, name groups, and the caches persisted through metadata.
//!
//! Every metadata value is stored as JSON text, so callers can keep any
//! serde type under a key.

use std::collections::{BTreeMap, BTreeSet};

use gendb_store::StorageBackend;
use gendb_types::{sort_key, CustomValueSink, Handle, ObjectType, Person, RegistryKind};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::database::Database;
use crate::error::DbResult;

pub(crate) const SURNAME_LIST_KEY: &str = "surname_list";
pub(crate) const DEFAULT_PERSON_KEY: &str = "default-person-handle";

fn bookmarks_key(object_type: ObjectType) -> String {
    format!("{}-bookmarks", object_type.table_name())
}

pub(crate) fn read_meta<T: DeserializeOwned>(
    backend: &dyn StorageBackend,
    key: &str,
) -> DbResult<Option<T>> {
    match backend.get_metadata(key)? {
        Some(text) => Ok(Some(serde_json::from_str(&text)?)),
        None => Ok(None),
    }
}

pub(crate) fn write_meta<T: Serialize + ?Sized>(
    backend: &dyn StorageBackend,
    key: &str,
    value: &T,
) -> DbResult<()> {
    backend.set_metadata(key, &serde_json::to_string(value)?)?;
    Ok(())
}

/// Custom-value registries and surname counts, kept in step with commits.
#[derive(Debug, Default)]
pub(crate) struct SecondaryIndex {
    registries: BTreeMap<RegistryKind, BTreeSet<String>>,
    surnames: BTreeMap<String, u64>,
    registries_dirty: bool,
    surnames_dirty: bool,
}

impl SecondaryIndex {
    pub(crate) fn load(backend: &dyn StorageBackend) -> DbResult<Self> {
        let mut index = Self::default();
        for kind in RegistryKind::ALL {
            if let Some(values) = read_meta::<BTreeSet<String>>(backend, kind.metadata_key())? {
                index.registries.insert(kind, values);
            }
        }
        if let Some(list) = read_meta::<Vec<(String, u64)>>(backend, SURNAME_LIST_KEY)? {
            index.surnames = list.into_iter().filter(|(_, n)| *n > 0).collect();
        }
        Ok(index)
    }

    pub(crate) fn save(&mut self, backend: &dyn StorageBackend) -> DbResult<()> {
        if self.registries_dirty {
            for kind in RegistryKind::ALL {
                let values = self.registries.get(&kind).cloned().unwrap_or_default();
                write_meta(backend, kind.metadata_key(), &values)?;
            }
            self.registries_dirty = false;
        }
        if self.surnames_dirty {
            let mut list: Vec<(&String, &u64)> = self.surnames.iter().collect();
            list.sort_by_cached_key(|(s, _)| sort_key(s));
            write_meta(backend, SURNAME_LIST_KEY, &list)?;
            self.surnames_dirty = false;
        }
        Ok(())
    }

    /// Forget everything, marking both caches for rewrite.
    pub(crate) fn clear(&mut self) {
        self.registries.clear();
        self.surnames.clear();
        self.registries_dirty = true;
        self.surnames_dirty = true;
    }

    pub(crate) fn values(&self, kind: RegistryKind) -> Vec<String> {
        self.registries
            .get(&kind)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub(crate) fn replace_surname(&mut self, before: Option<String>, after: Option<String>) {
        if before == after {
            return;
        }
        if let Some(old) = before {
            if let Some(n) = self.surnames.get_mut(&old) {
                *n -= 1;
                if *n == 0 {
                    self.surnames.remove(&old);
                }
            }
        }
        if let Some(new) = after {
            *self.surnames.entry(new).or_insert(0) += 1;
        }
        self.surnames_dirty = true;
    }

    pub(crate) fn surnames(&self) -> Vec<String> {
        let mut list: Vec<String> = self.surnames.keys().cloned().collect();
        list.sort_by_cached_key(|s| sort_key(s));
        list
    }
}

impl CustomValueSink for SecondaryIndex {
    fn record(&mut self, kind: RegistryKind, value: &str) {
        if value.is_empty() {
            return;
        }
        if self
            .registries
            .entry(kind)
            .or_default()
            .insert(value.to_string())
        {
            self.registries_dirty = true;
        }
    }
}

impl Database {
    /// Read a metadata value.
    pub fn get_metadata<T: DeserializeOwned>(&self, key: &str) -> DbResult<Option<T>> {
        read_meta(self.backend.as_ref(), key)
    }

    /// Write a metadata value.
    ///
    /// Metadata writes are not part of the undo history.
    pub fn set_metadata<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> DbResult<()> {
        self.check_writable()?;
        write_meta(self.backend.as_ref(), key, value)?;
        self.flush_if_idle()
    }

    /// Every metadata key currently stored.
    pub fn metadata_keys(&self) -> DbResult<Vec<String>> {
        Ok(self.backend.metadata_keys()?)
    }

    /// Custom values seen so far for one registry, sorted.
    pub fn custom_values(&self, kind: RegistryKind) -> Vec<String> {
        self.secondary.values(kind)
    }

    /// Distinct primary surnames of stored people, in collation order.
    pub fn surname_list(&self) -> Vec<String> {
        self.secondary.surnames()
    }

    /// Bookmarked handles of a type, in order.
    pub fn get_bookmarks(&self, object_type: ObjectType) -> DbResult<Vec<Handle>> {
        Ok(self
            .get_metadata::<Vec<Handle>>(&bookmarks_key(object_type))?
            .unwrap_or_default())
    }

    /// Replace the bookmarks of a type.
    pub fn set_bookmarks(&mut self, object_type: ObjectType, handles: &[Handle]) -> DbResult<()> {
        self.set_metadata(&bookmarks_key(object_type), handles)
    }

    /// Handle of the default person, if one is set.
    pub fn default_person_handle(&self) -> DbResult<Option<Handle>> {
        Ok(self
            .get_metadata::<Option<Handle>>(DEFAULT_PERSON_KEY)?
            .flatten())
    }

    /// Set or clear the home person.
    pub fn set_default_person_handle(&mut self, handle: Option<&Handle>) -> DbResult<()> {
        debug!(handle = ?handle, "default person changed");
        self.set_metadata(DEFAULT_PERSON_KEY, &handle)
    }

    /// The home person, if one is set and still exists.
    pub fn default_person(&self) -> DbResult<Option<Person>> {
        match self.default_person_handle()? {
            Some(handle) => self.try_get(&handle),
            None => Ok(None),
        }
    }

    /// Person to show first: the home person, else the first by handle.
    pub fn find_initial_person(&self) -> DbResult<Option<Person>> {
        if let Some(person) = self.default_person()? {
            return Ok(Some(person));
        }
        Ok(self.cursor::<Person>().next().transpose()?.map(|(_, p)| p))
    }

    /// The group a surname belongs to, or the surname itself if unmapped.
    pub fn get_name_group_mapping(&self, name: &str) -> DbResult<String> {
        Ok(self
            .backend
            .get_name_group(name)?
            .unwrap_or_else(|| name.to_string()))
    }

    /// Map `name` into `group`, or remove its mapping with `None`.
    pub fn set_name_group_mapping(&mut self, name: &str, group: Option<&str>) -> DbResult<()> {
        self.check_writable()?;
        self.backend.set_name_group(name, group)?;
        self.flush_if_idle()
    }

    pub fn has_name_group_key(&self, name: &str) -> DbResult<bool> {
        Ok(self.backend.get_name_group(name)?.is_some())
    }

    /// Every surname with a group mapping.
    pub fn name_group_keys(&self) -> DbResult<Vec<String>> {
        Ok(self.backend.name_group_keys()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surname_counts_drop_to_zero() {
        let mut index = SecondaryIndex::default();
        index.replace_surname(None, Some("Smith".into()));
        index.replace_surname(None, Some("Smith".into()));
        index.replace_surname(Some("Smith".into()), Some("Jones".into()));
        assert_eq!(index.surnames(), ["Jones", "Smith"]);
        index.replace_surname(Some("Smith".into()), None);
        assert_eq!(index.surnames(), ["Jones"]);
    }

    #[test]
    fn surnames_use_collation_order() {
        let mut index = SecondaryIndex::default();
        for s in ["Zeller", "Ångström", "Berg"] {
            index.replace_surname(None, Some(s.into()));
        }
        assert_eq!(index.surnames(), ["Ångström", "Berg", "Zeller"]);
    }

    #[test]
    fn registry_ignores_repeats_and_empty_values() {
        let mut index = SecondaryIndex::default();
        index.record(RegistryKind::EventNames, "Graduation");
        index.record(RegistryKind::EventNames, "Graduation");
        index.record(RegistryKind::EventNames, "");
        assert_eq!(index.values(RegistryKind::EventNames), ["Graduation"]);
        assert!(index.values(RegistryKind::UrlTypes).is_empty());
    }

    #[test]
    fn save_and_load_through_metadata() {
        let backend = gendb_store::InMemoryBackend::new();
        let mut index = SecondaryIndex::default();
        index.record(RegistryKind::NoteTypes, "Diary");
        index.replace_surname(None, Some("Smith".into()));
        index.save(&backend).unwrap();

        let loaded = SecondaryIndex::load(&backend).unwrap();
        assert_eq!(loaded.values(RegistryKind::NoteTypes), ["Diary"]);
        assert_eq!(loaded.surnames(), ["Smith"]);
    }
}
