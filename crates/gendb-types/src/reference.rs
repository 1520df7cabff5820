use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::handle::Handle;
use crate::object_type::ObjectType;

/// A typed pointer to a primary object.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectRef {
    pub object_type: ObjectType,
    pub handle: Handle,
}

impl ObjectRef {
    pub fn new(object_type: ObjectType, handle: Handle) -> Self {
        Self { object_type, handle }
    }
}

/// One row of the derived backlink table.
///
/// Edges are a cache: the authoritative data is the handle fields inside
/// the current objects, and the whole table can be regenerated from a scan.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReferenceEdge {
    pub referrer: Handle,
    pub referrer_type: ObjectType,
    pub referenced: Handle,
    pub referenced_type: ObjectType,
}

impl ReferenceEdge {
    pub fn new(from: &ObjectRef, to: &ObjectRef) -> Self {
        Self {
            referrer: from.handle.clone(),
            referrer_type: from.object_type,
            referenced: to.handle.clone(),
            referenced_type: to.object_type,
        }
    }

    /// The referenced end of the edge.
    pub fn target(&self) -> ObjectRef {
        ObjectRef::new(self.referenced_type, self.referenced.clone())
    }
}

/// Accumulates the distinct references reachable from one object.
///
/// Empty handles are unset optional links and are skipped.
#[derive(Debug, Default)]
pub struct RefCollector {
    refs: BTreeSet<ObjectRef>,
}

impl RefCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, object_type: ObjectType, handle: &Handle) {
        if !handle.is_empty() {
            self.refs.insert(ObjectRef::new(object_type, handle.clone()));
        }
    }

    pub fn add_opt(&mut self, object_type: ObjectType, handle: Option<&Handle>) {
        if let Some(h) = handle {
            self.add(object_type, h);
        }
    }

    pub fn add_all<'a>(&mut self, object_type: ObjectType, handles: impl IntoIterator<Item = &'a Handle>) {
        for h in handles {
            self.add(object_type, h);
        }
    }

    /// Walk every item of a nested list.
    pub fn walk<'a, T: HasReferences + 'a>(&mut self, items: impl IntoIterator<Item = &'a T>) {
        for item in items {
            item.collect_references(self);
        }
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    /// The collected references.
    pub fn into_refs(self) -> BTreeSet<ObjectRef> {
        self.refs
    }
}

/// Implemented by every structure that can hold handles, primary or nested.
///
/// Walking is transitive through nested structures but stops at other
/// primary objects: a referenced handle is recorded, never dereferenced.
pub trait HasReferences {
    fn collect_references(&self, refs: &mut RefCollector);
}
