use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::RwLock;

use gendb_types::{GrampsId, Handle, ObjectRef, ObjectType, ReferenceEdge};

use crate::error::StoreResult;
use crate::traits::{BackendKind, RawRow, StorageBackend};

#[derive(Debug, Default)]
struct Table {
    rows: BTreeMap<Handle, RawRow>,
    by_id: HashMap<String, Handle>,
}

impl Table {
    fn put(&mut self, row: &RawRow) {
        if let Some(old) = self.rows.get(&row.handle) {
            if old.gramps_id != row.gramps_id && self.by_id.get(&old.gramps_id) == Some(&row.handle) {
                self.by_id.remove(&old.gramps_id);
            }
        }
        if !row.gramps_id.is_empty() {
            self.by_id.insert(row.gramps_id.clone(), row.handle.clone());
        }
        self.rows.insert(row.handle.clone(), row.clone());
    }

    fn delete(&mut self, handle: &Handle) -> bool {
        match self.rows.remove(handle) {
            Some(old) => {
                if self.by_id.get(&old.gramps_id) == Some(handle) {
                    self.by_id.remove(&old.gramps_id);
                }
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct MemoryState {
    tables: [Table; 10],
    refs_from: BTreeMap<Handle, BTreeSet<ReferenceEdge>>,
    refs_to: BTreeMap<Handle, BTreeSet<ReferenceEdge>>,
    metadata: BTreeMap<String, String>,
    name_groups: BTreeMap<String, String>,
}

impl MemoryState {
    fn table(&self, object_type: ObjectType) -> &Table {
        &self.tables[object_type.index()]
    }

    fn table_mut(&mut self, object_type: ObjectType) -> &mut Table {
        &mut self.tables[object_type.index()]
    }

    fn delete_references_from(&mut self, referrer: &Handle) {
        if let Some(edges) = self.refs_from.remove(referrer) {
            for edge in edges {
                if let Some(set) = self.refs_to.get_mut(&edge.referenced) {
                    set.remove(&edge);
                    if set.is_empty() {
                        self.refs_to.remove(&edge.referenced);
                    }
                }
            }
        }
    }

    fn insert_edge(&mut self, edge: ReferenceEdge) {
        self.refs_to
            .entry(edge.referenced.clone())
            .or_default()
            .insert(edge.clone());
        self.refs_from
            .entry(edge.referrer.clone())
            .or_default()
            .insert(edge);
    }
}

/// Pure in-memory backend for embedding and tests.
///
/// Nothing is persisted; [`abort`](StorageBackend::abort) cannot roll back
/// and reports `false`.
pub struct InMemoryBackend {
    state: RwLock<MemoryState>,
}

impl InMemoryBackend {
    /// Create a new, empty in-memory backend.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
        }
    }

    /// Total rows across every object table.
    pub fn len(&self) -> usize {
        let state = self.state.read().expect("lock poisoned");
        state.tables.iter().map(|t| t.rows.len()).sum()
    }

    /// Returns `true` if no object of any type is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visit every row, edge group, metadata entry and name group in a stable order.
    pub(crate) fn snapshot<F>(&self, mut visit: F) -> StoreResult<()>
    where
        F: FnMut(SnapshotItem<'_>) -> StoreResult<()>,
    {
        let state = self.state.read().expect("lock poisoned");
        for ty in ObjectType::ALL {
            for row in state.table(ty).rows.values() {
                visit(SnapshotItem::Row(ty, row))?;
            }
        }
        for edges in state.refs_from.values() {
            visit(SnapshotItem::Edges(edges))?;
        }
        for (k, v) in &state.metadata {
            visit(SnapshotItem::Metadata(k, v))?;
        }
        for (k, v) in &state.name_groups {
            visit(SnapshotItem::NameGroup(k, v))?;
        }
        Ok(())
    }
}

pub(crate) enum SnapshotItem<'a> {
    Row(ObjectType, &'a RawRow),
    Edges(&'a BTreeSet<ReferenceEdge>),
    Metadata(&'a str, &'a str),
    NameGroup(&'a str, &'a str),
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for InMemoryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn is_read_only(&self) -> bool {
        false
    }

    fn get(&self, object_type: ObjectType, handle: &Handle) -> StoreResult<Option<RawRow>> {
        let state = self.state.read().expect("lock poisoned");
        Ok(state.table(object_type).rows.get(handle).cloned())
    }

    fn put(&self, object_type: ObjectType, row: &RawRow) -> StoreResult<()> {
        let mut state = self.state.write().expect("lock poisoned");
        state.table_mut(object_type).put(row);
        Ok(())
    }

    fn delete(&self, object_type: ObjectType, handle: &Handle) -> StoreResult<bool> {
        let mut state = self.state.write().expect("lock poisoned");
        Ok(state.table_mut(object_type).delete(handle))
    }

    fn contains(&self, object_type: ObjectType, handle: &Handle) -> StoreResult<bool> {
        let state = self.state.read().expect("lock poisoned");
        Ok(state.table(object_type).rows.contains_key(handle))
    }

    fn handle_for_id(&self, object_type: ObjectType, id: &str) -> StoreResult<Option<Handle>> {
        let state = self.state.read().expect("lock poisoned");
        Ok(state.table(object_type).by_id.get(id).cloned())
    }

    fn count(&self, object_type: ObjectType) -> StoreResult<usize> {
        let state = self.state.read().expect("lock poisoned");
        Ok(state.table(object_type).rows.len())
    }

    fn handles(&self, object_type: ObjectType, sorted: bool) -> StoreResult<Vec<Handle>> {
        let state = self.state.read().expect("lock poisoned");
        let rows = &state.table(object_type).rows;
        if !sorted {
            return Ok(rows.keys().cloned().collect());
        }
        let mut keyed: Vec<(&str, &Handle)> =
            rows.values().map(|r| (r.order_by.as_str(), &r.handle)).collect();
        keyed.sort();
        Ok(keyed.into_iter().map(|(_, h)| h.clone()).collect())
    }

    fn ids(&self, object_type: ObjectType) -> StoreResult<Vec<GrampsId>> {
        let state = self.state.read().expect("lock poisoned");
        let mut ids: Vec<GrampsId> = state
            .table(object_type)
            .by_id
            .keys()
            .map(|id| GrampsId::new(id.as_str()))
            .collect();
        ids.sort();
        Ok(ids)
    }

    fn scan_page(
        &self,
        object_type: ObjectType,
        after: Option<&Handle>,
        limit: usize,
    ) -> StoreResult<Vec<RawRow>> {
        use std::ops::Bound;

        let state = self.state.read().expect("lock poisoned");
        let rows = &state.table(object_type).rows;
        let lower = match after {
            Some(h) => Bound::Excluded(h.clone()),
            None => Bound::Unbounded,
        };
        Ok(rows
            .range((lower, Bound::Unbounded))
            .take(limit)
            .map(|(_, r)| r.clone())
            .collect())
    }

    fn replace_references(
        &self,
        referrer: &ObjectRef,
        targets: &BTreeSet<ObjectRef>,
    ) -> StoreResult<()> {
        let mut state = self.state.write().expect("lock poisoned");
        state.delete_references_from(&referrer.handle);
        for target in targets {
            state.insert_edge(ReferenceEdge::new(referrer, target));
        }
        Ok(())
    }

    fn delete_references_from(&self, referrer: &Handle) -> StoreResult<()> {
        let mut state = self.state.write().expect("lock poisoned");
        state.delete_references_from(referrer);
        Ok(())
    }

    fn references_to(&self, handle: &Handle) -> StoreResult<Vec<ReferenceEdge>> {
        let state = self.state.read().expect("lock poisoned");
        Ok(state
            .refs_to
            .get(handle)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn references_from(&self, handle: &Handle) -> StoreResult<Vec<ReferenceEdge>> {
        let state = self.state.read().expect("lock poisoned");
        Ok(state
            .refs_from
            .get(handle)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn all_references(&self) -> StoreResult<Vec<ReferenceEdge>> {
        let state = self.state.read().expect("lock poisoned");
        let mut all: Vec<ReferenceEdge> = state.refs_from.values().flatten().cloned().collect();
        all.sort();
        Ok(all)
    }

    fn clear_references(&self) -> StoreResult<()> {
        let mut state = self.state.write().expect("lock poisoned");
        state.refs_from.clear();
        state.refs_to.clear();
        Ok(())
    }

    fn get_metadata(&self, key: &str) -> StoreResult<Option<String>> {
        let state = self.state.read().expect("lock poisoned");
        Ok(state.metadata.get(key).cloned())
    }

    fn set_metadata(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut state = self.state.write().expect("lock poisoned");
        state.metadata.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn metadata_keys(&self) -> StoreResult<Vec<String>> {
        let state = self.state.read().expect("lock poisoned");
        Ok(state.metadata.keys().cloned().collect())
    }

    fn get_name_group(&self, name: &str) -> StoreResult<Option<String>> {
        let state = self.state.read().expect("lock poisoned");
        Ok(state.name_groups.get(name).cloned())
    }

    fn set_name_group(&self, name: &str, group: Option<&str>) -> StoreResult<()> {
        let mut state = self.state.write().expect("lock poisoned");
        match group {
            Some(g) => {
                state.name_groups.insert(name.to_string(), g.to_string());
            }
            None => {
                state.name_groups.remove(name);
            }
        }
        Ok(())
    }

    fn name_group_keys(&self) -> StoreResult<Vec<String>> {
        let state = self.state.read().expect("lock poisoned");
        Ok(state.name_groups.keys().cloned().collect())
    }

    fn begin(&self) -> StoreResult<()> {
        Ok(())
    }

    fn commit(&self) -> StoreResult<()> {
        Ok(())
    }

    fn abort(&self) -> StoreResult<bool> {
        Ok(false)
    }

    fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBackend")
            .field("row_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(handle: &str, id: &str, order: &str) -> RawRow {
        RawRow {
            handle: Handle::from(handle),
            gramps_id: id.to_string(),
            order_by: order.to_string(),
            data: b"{}".to_vec(),
        }
    }

    #[test]
    fn changing_id_releases_the_old_one() {
        let backend = InMemoryBackend::new();
        backend.put(ObjectType::Person, &row("h1", "I0001", "")).unwrap();
        backend.put(ObjectType::Person, &row("h1", "I0002", "")).unwrap();
        assert_eq!(backend.handle_for_id(ObjectType::Person, "I0001").unwrap(), None);
        assert_eq!(
            backend.handle_for_id(ObjectType::Person, "I0002").unwrap(),
            Some(Handle::from("h1"))
        );
    }

    #[test]
    fn tables_are_separate_per_type() {
        let backend = InMemoryBackend::new();
        backend.put(ObjectType::Note, &row("h1", "N0001", "")).unwrap();
        assert!(!backend.contains(ObjectType::Person, &Handle::from("h1")).unwrap());
        assert_eq!(backend.count(ObjectType::Note).unwrap(), 1);
        assert_eq!(backend.len(), 1);
    }

    #[test]
    fn reverse_index_follows_replacement() {
        let backend = InMemoryBackend::new();
        let from = ObjectRef::new(ObjectType::Person, Handle::from("p1"));
        let old: BTreeSet<_> = [ObjectRef::new(ObjectType::Note, Handle::from("n1"))].into();
        let new: BTreeSet<_> = [ObjectRef::new(ObjectType::Note, Handle::from("n2"))].into();
        backend.replace_references(&from, &old).unwrap();
        backend.replace_references(&from, &new).unwrap();
        assert!(backend.references_to(&Handle::from("n1")).unwrap().is_empty());
        assert_eq!(backend.references_to(&Handle::from("n2")).unwrap().len(), 1);
    }
}
