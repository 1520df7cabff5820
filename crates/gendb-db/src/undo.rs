use std::collections::VecDeque;

use gendb_store::{codec, RawRow};
use gendb_types::{Handle, ObjectType};
use tracing::{info, warn};

use crate::database::{person_surname, Database};
use crate::error::{DbError, DbResult};
use crate::events::ChangeKind;
use crate::txn::{ChangeSet, Operation, UndoRecord};

/// The undoable record of one committed transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UndoEntry {
    pub txn_id: u64,
    pub description: String,
    pub records: Vec<UndoRecord>,
}

/// Bounded history of committed transactions.
///
/// Committing a new transaction clears the redo queue. When more than
/// `retention` transactions are held the oldest is dropped, after which the
/// session can no longer be abandoned.
#[derive(Debug)]
pub(crate) struct UndoLog {
    undo: VecDeque<UndoEntry>,
    redo: Vec<UndoEntry>,
    retention: usize,
    truncated: bool,
    batch_seen: bool,
}

impl UndoLog {
    pub(crate) fn new(retention: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            retention,
            truncated: false,
            batch_seen: false,
        }
    }

    pub(crate) fn push(&mut self, entry: UndoEntry) {
        self.redo.clear();
        self.undo.push_back(entry);
        while self.undo.len() > self.retention {
            self.undo.pop_front();
            self.truncated = true;
        }
    }

    /// A batch transaction invalidates everything recorded so far.
    pub(crate) fn batch_started(&mut self) {
        self.undo.clear();
        self.redo.clear();
        self.batch_seen = true;
    }

    pub(crate) fn len(&self) -> usize {
        self.undo.len()
    }

    pub(crate) fn abandon_possible(&self) -> bool {
        !self.truncated && !self.batch_seen
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Undo,
    Redo,
}

impl Database {
    /// Returns `true` if there is a transaction to undo.
    pub fn can_undo(&self) -> bool {
        !self.undo.undo.is_empty()
    }

    /// Returns `true` if there is an undone transaction to redo.
    pub fn can_redo(&self) -> bool {
        !self.undo.redo.is_empty()
    }

    /// Description of the transaction [`undo`](Self::undo) would revert.
    pub fn undo_description(&self) -> Option<&str> {
        self.undo.undo.back().map(|e| e.description.as_str())
    }

    /// Description of the transaction `redo` would re-apply.
    pub fn redo_description(&self) -> Option<&str> {
        self.undo.redo.last().map(|e| e.description.as_str())
    }

    /// Revert the most recent committed transaction.
    ///
    /// Returns `false` when there is nothing to undo.
    pub fn undo(&mut self) -> DbResult<bool> {
        self.check_idle()?;
        let Some(entry) = self.undo.undo.pop_back() else {
            return Ok(false);
        };
        match self.replay(&entry, Direction::Undo) {
            Ok(changes) => {
                info!(txn = entry.txn_id, description = %entry.description, "undone");
                self.undo.redo.push(entry);
                self.events.publish(changes.into_events());
                Ok(true)
            }
            Err(e) => {
                self.undo.undo.push_back(entry);
                Err(e)
            }
        }
    }

    /// Reapply the most recently undone transaction.
    pub fn redo(&mut self) -> DbResult<bool> {
        self.check_idle()?;
        let Some(entry) = self.undo.redo.pop() else {
            return Ok(false);
        };
        match self.replay(&entry, Direction::Redo) {
            Ok(changes) => {
                info!(txn = entry.txn_id, description = %entry.description, "redone");
                self.undo.undo.push_back(entry);
                self.events.publish(changes.into_events());
                Ok(true)
            }
            Err(e) => {
                self.undo.redo.push(entry);
                Err(e)
            }
        }
    }

    /// Undo every transaction of this session.
    ///
    /// Fails with [`DbError::AbandonNotPossible`] once history has been
    /// truncated or a batch transaction has run.
    pub fn abandon_changes(&mut self) -> DbResult<()> {
        self.check_idle()?;
        if !self.undo.abandon_possible() {
            return Err(DbError::AbandonNotPossible);
        }
        let mut reverted = 0usize;
        while self.undo()? {
            reverted += 1;
        }
        self.undo.redo.clear();
        info!(transactions = reverted, "session changes abandoned");
        Ok(())
    }

    fn replay(&mut self, entry: &UndoEntry, direction: Direction) -> DbResult<ChangeSet> {
        self.backend.begin()?;
        let mut changes = ChangeSet::default();
        let applied = self
            .apply_entry(entry, direction, &mut changes)
            .and_then(|()| self.persist_state())
            .and_then(|()| self.backend.commit().map_err(DbError::from));
        match applied {
            Ok(()) => Ok(changes),
            Err(e) => {
                warn!(txn = entry.txn_id, error = %e, "undo replay failed");
                if let Err(abort) = self.backend.abort() {
                    warn!(error = %abort, "rollback after failed replay also failed");
                }
                self.reload_state()?;
                Err(e)
            }
        }
    }

    fn apply_entry(
        &mut self,
        entry: &UndoEntry,
        direction: Direction,
        changes: &mut ChangeSet,
    ) -> DbResult<()> {
        match direction {
            Direction::Undo => {
                for record in entry.records.iter().rev() {
                    self.restore(record.object_type, &record.handle, record.old.as_ref())?;
                    let change = match record.operation {
                        Operation::Add => ChangeKind::Delete,
                        Operation::Update => ChangeKind::Update,
                        Operation::Delete => ChangeKind::Add,
                    };
                    changes.note(record.object_type, change, &record.handle);
                }
            }
            Direction::Redo => {
                for record in &entry.records {
                    self.restore(record.object_type, &record.handle, record.new.as_ref())?;
                    let change = match record.operation {
                        Operation::Add => ChangeKind::Add,
                        Operation::Update => ChangeKind::Update,
                        Operation::Delete => ChangeKind::Delete,
                    };
                    changes.note(record.object_type, change, &record.handle);
                }
            }
        }
        Ok(())
    }

    /// Put the stored state of one object back to `row`, or delete it.
    fn restore(
        &mut self,
        object_type: ObjectType,
        handle: &Handle,
        row: Option<&RawRow>,
    ) -> DbResult<()> {
        let before = self.backend.get(object_type, handle)?;
        match row {
            Some(row) => {
                self.backend.put(object_type, row)?;
                match codec::from_row(row) {
                    Ok(object) => {
                        self.update_backlinks(&object)?;
                        object.record_custom_values(&mut self.secondary);
                    }
                    Err(e) => {
                        warn!(%object_type, %handle, error = %e, "restored row does not decode");
                        self.backend.delete_references_from(handle)?;
                    }
                }
            }
            None => {
                self.backend.delete(object_type, handle)?;
                self.backend.delete_references_from(handle)?;
            }
        }
        self.secondary.replace_surname(
            before.as_ref().and_then(|r| person_surname(object_type, r)),
            row.and_then(|r| person_surname(object_type, r)),
        );
        Ok(())
    }
}
