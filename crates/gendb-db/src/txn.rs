use std::collections::BTreeSet;

use gendb_store::RawRow;
use gendb_types::{Handle, ObjectType};
use serde::{Deserialize, Serialize};

use crate::events::{ChangeKind, DbEvent};
use crate::undo::UndoEntry;

/// What a single undo record did.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    Add,
    Update,
    Delete,
}

/// One object write, with the rows before and after it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UndoRecord {
    pub object_type: ObjectType,
    pub operation: Operation,
    pub handle: Handle,
    pub old: Option<RawRow>,
    pub new: Option<RawRow>,
}

/// A named scope around one or more writes.
///
/// Obtained from [`Database::transaction_begin`](crate::Database::transaction_begin)
/// or [`Database::batch_begin`](crate::Database::batch_begin) and handed
/// back to `transaction_commit` or `transaction_abort`.
#[derive(Debug)]
pub struct Transaction {
    id: u64,
    description: String,
    batch: bool,
    pub(crate) records: Vec<UndoRecord>,
    pub(crate) changes: ChangeSet,
    pub(crate) failed: bool,
}

impl Transaction {
    pub(crate) fn new(id: u64, description: impl Into<String>, batch: bool) -> Self {
        Self {
            id,
            description: description.into(),
            batch,
            records: Vec::new(),
            changes: ChangeSet::default(),
            failed: false,
        }
    }

    /// Sequence number of this transaction within the session.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Batch transactions keep no undo history and do not maintain backlinks.
    pub fn is_batch(&self) -> bool {
        self.batch
    }

    /// Number of undoable writes so far.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The writes recorded so far, in order.
    pub fn records(&self) -> &[UndoRecord] {
        &self.records
    }

    pub(crate) fn into_parts(self) -> (UndoEntry, ChangeSet) {
        let entry = UndoEntry {
            txn_id: self.id,
            description: self.description,
            records: self.records,
        };
        (entry, self.changes)
    }
}

/// Handles added, updated and deleted during one transaction, per type.
///
/// An object added and then updated counts as added; an object added and
/// then deleted counts only as deleted.
#[derive(Clone, Debug, Default)]
pub(crate) struct ChangeSet {
    added: [BTreeSet<Handle>; 10],
    updated: [BTreeSet<Handle>; 10],
    deleted: [BTreeSet<Handle>; 10],
}

impl ChangeSet {
    pub(crate) fn note(&mut self, object_type: ObjectType, kind: ChangeKind, handle: &Handle) {
        let i = object_type.index();
        match kind {
            ChangeKind::Add => {
                self.deleted[i].remove(handle);
                self.added[i].insert(handle.clone());
            }
            ChangeKind::Update => {
                if !self.added[i].contains(handle) {
                    self.updated[i].insert(handle.clone());
                }
            }
            ChangeKind::Delete => {
                self.added[i].remove(handle);
                self.updated[i].remove(handle);
                self.deleted[i].insert(handle.clone());
            }
        }
    }

    /// Events in delivery order: every delete, then adds, then updates.
    pub(crate) fn into_events(self) -> Vec<DbEvent> {
        let mut events = Vec::new();
        for (kind, sets) in [
            (ChangeKind::Delete, self.deleted),
            (ChangeKind::Add, self.added),
            (ChangeKind::Update, self.updated),
        ] {
            for (ty, set) in ObjectType::ALL.into_iter().zip(sets) {
                if !set.is_empty() {
                    events.push(DbEvent {
                        object_type: ty,
                        change: kind,
                        handles: set.into_iter().collect(),
                    });
                }
            }
        }
        events
    }
}
