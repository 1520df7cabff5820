use std::time::{SystemTime, UNIX_EPOCH};

use gendb_store::{codec, open_backend, BackendKind, RawCursor, RawRow, StorageBackend, SCHEMA_VERSION};
use gendb_types::{sort_key, GrampsId, Handle, ObjectType, Person, Primary, PrimaryObject};
use tracing::{debug, info, warn};

use crate::config::DbConfig;
use crate::cursor::Cursor;
use crate::error::{DbError, DbResult, IntegrityError};
use crate::events::{ChangeKind, EventBus, EventFilter, EventStream};
use crate::ids::{IdAllocator, IdTemplate};
use crate::metadata::{read_meta, write_meta, SecondaryIndex};
use crate::txn::{Operation, Transaction, UndoRecord};
use crate::undo::UndoLog;

pub(crate) const VERSION_KEY: &str = "version";
pub(crate) const DBID_KEY: &str = "dbid";

fn prefix_key(object_type: ObjectType) -> String {
    format!("{}-id-prefix", object_type.table_name())
}

fn cursor_key(object_type: ObjectType) -> String {
    format!("{}-id-cursor", object_type.table_name())
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// Overview of an open database.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Summary {
    pub dbid: String,
    pub backend: BackendKind,
    pub schema_version: u32,
    pub read_only: bool,
    /// Object count per type, in scan order.
    pub counts: Vec<(ObjectType, usize)>,
    pub undo_depth: usize,
}

/// The object store.
///
/// Every mutation happens inside a [`Transaction`] and goes through
/// [`commit`](Self::commit) or [`remove`](Self::remove), which keep the
/// order keys, custom-value registries, surname list, backlinks and undo
/// history in step with the object tables. Reads go straight to the
/// backend.
///
/// Only one transaction may be active at a time. The store assumes a single
/// writer; it does not guard against a second process opening the same file.
pub struct Database {
    pub(crate) backend: Box<dyn StorageBackend>,
    pub(crate) config: DbConfig,
    dbid: String,
    pub(crate) ids: IdAllocator,
    pub(crate) secondary: SecondaryIndex,
    pub(crate) undo: UndoLog,
    pub(crate) events: EventBus,
    pub(crate) active_txn: Option<u64>,
    next_txn_id: u64,
}

impl Database {
    /// Open the database described by `config`.
    pub fn open(config: DbConfig) -> DbResult<Self> {
        let backend = open_backend(&config.backend)?;
        Self::with_backend(backend, config)
    }

    /// A fresh in-memory database.
    pub fn in_memory() -> DbResult<Self> {
        Self::open(DbConfig::memory())
    }

    /// Open over an already constructed backend.
    pub fn with_backend(backend: Box<dyn StorageBackend>, config: DbConfig) -> DbResult<Self> {
        check_version(backend.as_ref())?;
        let dbid = match read_meta::<String>(backend.as_ref(), DBID_KEY)? {
            Some(id) => id,
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                if !backend.is_read_only() {
                    write_meta(backend.as_ref(), DBID_KEY, &id)?;
                }
                id
            }
        };
        let ids = load_ids(backend.as_ref(), &config)?;
        let secondary = SecondaryIndex::load(backend.as_ref())?;
        let undo = UndoLog::new(config.undo_retention);
        let events = EventBus::new(config.event_capacity);
        info!(
            dbid = %dbid,
            backend = %backend.kind(),
            read_only = backend.is_read_only(),
            "database opened"
        );
        let mut db = Self {
            backend,
            config,
            dbid,
            ids,
            secondary,
            undo,
            events,
            active_txn: None,
            next_txn_id: 1,
        };
        if !db.is_read_only() {
            db.persist_state()?;
            db.backend.commit()?;
        }
        Ok(db)
    }

    /// Unique id of this database, assigned when it was created.
    pub fn dbid(&self) -> &str {
        &self.dbid
    }

    /// Configuration the database was opened with.
    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    /// Which storage backend is in use.
    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Returns `true` if writes are refused.
    pub fn is_read_only(&self) -> bool {
        self.backend.is_read_only()
    }

    /// Direct access to the storage backend.
    pub fn backend(&self) -> &dyn StorageBackend {
        self.backend.as_ref()
    }

    /// Flush pending metadata and close the backend.
    ///
    /// An active transaction is aborted.
    pub fn close(mut self) -> DbResult<()> {
        if let Some(id) = self.active_txn.take() {
            warn!(txn = id, "closing with an active transaction; aborting it");
            if self.backend.abort()? {
                self.reload_state()?;
            }
        }
        if !self.is_read_only() {
            self.persist_state()?;
        }
        self.backend.close()?;
        info!(dbid = %self.dbid, "database closed");
        Ok(())
    }

    /// Object counts and details about this database.
    pub fn summary(&self) -> DbResult<Summary> {
        let counts = ObjectType::ALL
            .into_iter()
            .map(|ty| Ok((ty, self.backend.count(ty)?)))
            .collect::<DbResult<Vec<_>>>()?;
        Ok(Summary {
            dbid: self.dbid.clone(),
            backend: self.backend.kind(),
            schema_version: SCHEMA_VERSION,
            read_only: self.is_read_only(),
            counts,
            undo_depth: self.undo.len(),
        })
    }

    /// Returns `true` if no object of any type is stored.
    pub fn is_empty(&self) -> DbResult<bool> {
        for ty in ObjectType::ALL {
            if self.backend.count(ty)? > 0 {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Receive change events matching `filter`.
    pub fn subscribe(&self, filter: EventFilter) -> EventStream {
        self.events.subscribe(filter)
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Begin a transaction. Only one may be active at a time.
    pub fn transaction_begin(&mut self, description: &str) -> DbResult<Transaction> {
        self.begin_inner(description, false)
    }

    /// Begin a batch transaction for bulk loading.
    ///
    /// Batch writes skip backlink maintenance and undo recording, and the
    /// existing undo history is discarded. Call
    /// [`reindex_reference_map`](Self::reindex_reference_map) once the batch
    /// is committed.
    pub fn batch_begin(&mut self, description: &str) -> DbResult<Transaction> {
        self.begin_inner(description, true)
    }

    fn begin_inner(&mut self, description: &str, batch: bool) -> DbResult<Transaction> {
        self.check_writable()?;
        if self.active_txn.is_some() {
            return Err(DbError::TransactionActive);
        }
        self.backend.begin()?;
        let id = self.next_txn_id;
        self.next_txn_id += 1;
        self.active_txn = Some(id);
        if batch {
            self.undo.batch_started();
        }
        debug!(txn = id, description, batch, "transaction begin");
        Ok(Transaction::new(id, description, batch))
    }

    /// Commit a transaction, making its writes durable and undoable.
    pub fn transaction_commit(&mut self, txn: Transaction) -> DbResult<()> {
        self.check_txn(&txn)?;
        let written = self
            .persist_state()
            .and_then(|()| self.backend.commit().map_err(DbError::from));
        if let Err(e) = written {
            self.active_txn = None;
            if let Err(abort) = self.backend.abort() {
                warn!(txn = txn.id(), error = %abort, "abort after failed commit also failed");
            }
            self.reload_state()?;
            return Err(e);
        }
        self.active_txn = None;
        self.finish(txn);
        Ok(())
    }

    /// Abort a transaction.
    ///
    /// Returns `true` if the backend rolled the writes back. Backends without
    /// rollback return `false`; their writes stand and are recorded for undo
    /// exactly as if the transaction had committed.
    pub fn transaction_abort(&mut self, txn: Transaction) -> DbResult<bool> {
        if txn.failed {
            return Ok(false);
        }
        if self.active_txn != Some(txn.id()) {
            return Err(DbError::StaleTransaction);
        }
        self.active_txn = None;
        let rolled_back = self.backend.abort()?;
        if rolled_back {
            self.reload_state()?;
            info!(txn = txn.id(), description = txn.description(), "transaction rolled back");
        } else {
            self.persist_state()?;
            self.backend.commit()?;
            warn!(
                txn = txn.id(),
                description = txn.description(),
                "backend cannot roll back; aborted writes stand"
            );
            self.finish(txn);
        }
        Ok(rolled_back)
    }

    /// Run `f` inside a transaction, committing on `Ok` and aborting on `Err`.
    pub fn with_transaction<R, F>(&mut self, description: &str, f: F) -> DbResult<R>
    where
        F: FnOnce(&mut Self, &mut Transaction) -> DbResult<R>,
    {
        let mut txn = self.transaction_begin(description)?;
        match f(self, &mut txn) {
            Ok(value) => {
                self.transaction_commit(txn)?;
                Ok(value)
            }
            Err(e) => {
                if let Err(abort) = self.transaction_abort(txn) {
                    warn!(error = %abort, "abort after failed transaction body failed");
                }
                Err(e)
            }
        }
    }

    fn finish(&mut self, txn: Transaction) {
        let batch = txn.is_batch();
        let (entry, changes) = txn.into_parts();
        info!(
            txn = entry.txn_id,
            description = %entry.description,
            writes = entry.records.len(),
            batch,
            "transaction committed"
        );
        if batch {
            return;
        }
        if !entry.records.is_empty() {
            self.undo.push(entry);
        }
        self.events.publish(changes.into_events());
    }

    pub(crate) fn check_writable(&self) -> DbResult<()> {
        if self.is_read_only() {
            return Err(DbError::ReadOnly);
        }
        Ok(())
    }

    fn check_txn(&self, txn: &Transaction) -> DbResult<()> {
        if txn.failed {
            return Err(DbError::TransactionAborted);
        }
        if self.active_txn != Some(txn.id()) {
            return Err(DbError::StaleTransaction);
        }
        Ok(())
    }

    /// Make a write done outside any transaction durable.
    pub(crate) fn flush_if_idle(&self) -> DbResult<()> {
        if self.active_txn.is_none() {
            self.backend.commit()?;
        }
        Ok(())
    }

    pub(crate) fn check_idle(&self) -> DbResult<()> {
        self.check_writable()?;
        if self.active_txn.is_some() {
            return Err(DbError::TransactionActive);
        }
        Ok(())
    }

    /// Mark `txn` failed after a write error and roll back what the backend can.
    ///
    /// On backends without rollback the writes made before the failure stand;
    /// they are persisted and recorded for undo as in `transaction_abort`.
    fn fail(&mut self, txn: &mut Transaction, err: DbError) -> DbError {
        warn!(txn = txn.id(), error = %err, "write failed; aborting transaction");
        txn.failed = true;
        self.active_txn = None;
        match self.backend.abort() {
            Ok(true) => {
                if let Err(e) = self.reload_state() {
                    warn!(error = %e, "could not reload state after rollback");
                }
            }
            Ok(false) => {
                let mut standing = Transaction::new(txn.id(), txn.description(), txn.is_batch());
                standing.records = std::mem::take(&mut txn.records);
                standing.changes = std::mem::take(&mut txn.changes);
                if let Err(e) = self
                    .persist_state()
                    .and_then(|()| self.backend.commit().map_err(DbError::from))
                {
                    warn!(error = %e, "could not persist writes that stand after a failure");
                }
                self.finish(standing);
            }
            Err(e) => warn!(error = %e, "rollback failed"),
        }
        err
    }

    /// Write id counters, registries and the surname list to metadata.
    pub(crate) fn persist_state(&mut self) -> DbResult<()> {
        if self.ids.take_dirty() {
            for ty in ObjectType::ALL.into_iter().filter(|t| t.has_gramps_id()) {
                write_meta(self.backend.as_ref(), &prefix_key(ty), &self.ids.template(ty).to_string())?;
                write_meta(self.backend.as_ref(), &cursor_key(ty), &self.ids.cursor(ty))?;
            }
        }
        self.secondary.save(self.backend.as_ref())
    }

    /// Reload cached state from metadata, after a rollback.
    pub(crate) fn reload_state(&mut self) -> DbResult<()> {
        self.ids = load_ids(self.backend.as_ref(), &self.config)?;
        self.secondary = SecondaryIndex::load(self.backend.as_ref())?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Add a new object.
    ///
    /// A handle is generated if the object has none; an id is allocated if
    /// `assign_id` is set and the object has none. Returns the handle.
    pub fn add<T: Primary>(
        &mut self,
        obj: &mut T,
        txn: &mut Transaction,
        assign_id: bool,
    ) -> DbResult<Handle> {
        self.check_writable()?;
        self.check_txn(txn)?;
        if obj.handle().is_empty() {
            obj.set_handle(self.new_handle()?);
        }
        if assign_id && T::TYPE.has_gramps_id() && obj.gramps_id().is_empty() {
            obj.set_gramps_id(self.find_next_id(T::TYPE)?);
        }
        self.commit(obj, txn)?;
        Ok(obj.handle().clone())
    }

    /// Store an object, inserting or replacing by handle.
    ///
    /// The object's `change` time is set to now.
    pub fn commit<T: Primary>(&mut self, obj: &mut T, txn: &mut Transaction) -> DbResult<()> {
        self.check_writable()?;
        self.check_txn(txn)?;
        obj.set_change(now_secs());
        self.commit_object(obj.clone().into_object(), txn)
    }

    /// Store an object of any type. See [`commit`](Self::commit).
    pub fn commit_object(&mut self, object: PrimaryObject, txn: &mut Transaction) -> DbResult<()> {
        self.check_writable()?;
        self.check_txn(txn)?;
        if let Err(e) = self.check_write_integrity(&object) {
            return Err(self.fail(txn, e));
        }
        match self.write_object(&object, txn) {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail(txn, e)),
        }
    }

    /// Remove an object. Referrers are not touched.
    ///
    /// Returns `false` if no such object existed.
    pub fn remove<T: Primary>(&mut self, handle: &Handle, txn: &mut Transaction) -> DbResult<bool> {
        self.remove_object(T::TYPE, handle, txn)
    }

    /// Remove an object of any type. See [`remove`](Self::remove).
    pub fn remove_object(
        &mut self,
        object_type: ObjectType,
        handle: &Handle,
        txn: &mut Transaction,
    ) -> DbResult<bool> {
        self.check_writable()?;
        self.check_txn(txn)?;
        match self.delete_row(object_type, handle, txn) {
            Ok(existed) => Ok(existed),
            Err(e) => Err(self.fail(txn, e)),
        }
    }

    fn check_write_integrity(&self, object: &PrimaryObject) -> DbResult<()> {
        let object_type = object.object_type();
        let handle = object.handle();
        if handle.is_empty() {
            return Err(IntegrityError::EmptyHandle(object_type).into());
        }
        for existing in ObjectType::ALL {
            if existing != object_type && self.backend.contains(existing, handle)? {
                return Err(IntegrityError::HandleInUse {
                    handle: handle.clone(),
                    object_type,
                    existing,
                }
                .into());
            }
        }
        let id = object.gramps_id();
        if !id.is_empty() {
            if let Some(existing) = self.backend.handle_for_id(object_type, id.as_str())? {
                if &existing != handle {
                    return Err(IntegrityError::DuplicateId {
                        object_type,
                        id: id.to_string(),
                        existing,
                    }
                    .into());
                }
            }
        }
        for target in object.referenced_handles() {
            if self.backend.contains(target.object_type, &target.handle)? {
                continue;
            }
            for actual in ObjectType::ALL {
                if actual != target.object_type && self.backend.contains(actual, &target.handle)? {
                    return Err(IntegrityError::ImpossibleReference {
                        referrer: handle.clone(),
                        handle: target.handle,
                        expected: target.object_type,
                        actual,
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    fn write_object(&mut self, object: &PrimaryObject, txn: &mut Transaction) -> DbResult<()> {
        let object_type = object.object_type();
        let handle = object.handle();
        let old = self.backend.get(object_type, handle)?;
        let row = codec::to_row(object, self.order_key(object)?)?;
        self.backend.put(object_type, &row)?;

        object.record_custom_values(&mut self.secondary);
        if object_type == ObjectType::Person {
            let before = old.as_ref().and_then(|r| person_surname(object_type, r));
            let after = person_surname(object_type, &row);
            self.secondary.replace_surname(before, after);
        }

        if txn.is_batch() {
            return Ok(());
        }
        self.update_backlinks(object)?;
        let (operation, change) = match old {
            Some(_) => (Operation::Update, ChangeKind::Update),
            None => (Operation::Add, ChangeKind::Add),
        };
        txn.changes.note(object_type, change, handle);
        txn.records.push(UndoRecord {
            object_type,
            operation,
            handle: handle.clone(),
            old,
            new: Some(row),
        });
        Ok(())
    }

    fn delete_row(
        &mut self,
        object_type: ObjectType,
        handle: &Handle,
        txn: &mut Transaction,
    ) -> DbResult<bool> {
        let Some(old) = self.backend.get(object_type, handle)? else {
            debug!(%object_type, %handle, "remove of a missing object ignored");
            return Ok(false);
        };
        self.backend.delete(object_type, handle)?;
        self.backend.delete_references_from(handle)?;
        if object_type == ObjectType::Person {
            self.secondary
                .replace_surname(person_surname(object_type, &old), None);
        }
        if !txn.is_batch() {
            txn.changes.note(object_type, ChangeKind::Delete, handle);
            txn.records.push(UndoRecord {
                object_type,
                operation: Operation::Delete,
                handle: handle.clone(),
                old: Some(old),
                new: None,
            });
        }
        Ok(true)
    }

    /// Collation key stored beside the object.
    pub(crate) fn order_key(&self, object: &PrimaryObject) -> DbResult<String> {
        if let Some(key) = object.order_key() {
            return Ok(key);
        }
        let parent = match object {
            PrimaryObject::Family(f) => f.ordering_parent(),
            _ => None,
        };
        let text = match parent {
            Some(h) => self
                .try_get::<Person>(h)?
                .map(|p| p.sort_name())
                .unwrap_or_default(),
            None => String::new(),
        };
        Ok(sort_key(&text))
    }

    /// A fresh handle not used by an object of any type.
    fn new_handle(&self) -> DbResult<Handle> {
        'retry: loop {
            let handle = Handle::generate();
            for ty in ObjectType::ALL {
                if self.backend.contains(ty, &handle)? {
                    continue 'retry;
                }
            }
            return Ok(handle);
        }
    }

    // ------------------------------------------------------------------
    // Ids
    // ------------------------------------------------------------------

    /// Allocate the next unused id for `object_type`.
    pub fn find_next_id(&mut self, object_type: ObjectType) -> DbResult<GrampsId> {
        if !object_type.has_gramps_id() {
            return Err(DbError::Config(format!("{object_type} objects have no id")));
        }
        let backend = self.backend.as_ref();
        self.ids.next_id(object_type, |id| {
            Ok(backend.handle_for_id(object_type, id.as_str())?.is_some())
        })
    }

    /// The id template in use for a type, such as `I%04d`.
    pub fn id_prefix(&self, object_type: ObjectType) -> String {
        self.ids.template(object_type).to_string()
    }

    /// Change the id template for a type and persist it.
    ///
    /// Returns the template as validated.
    pub fn set_id_prefix(&mut self, object_type: ObjectType, template: &str) -> DbResult<String> {
        self.check_writable()?;
        if !object_type.has_gramps_id() {
            return Err(DbError::Config(format!("{object_type} objects have no id")));
        }
        let parsed = IdTemplate::validated(template, object_type);
        let text = parsed.to_string();
        self.ids.set_template(object_type, parsed);
        write_meta(self.backend.as_ref(), &prefix_key(object_type), &text)?;
        self.flush_if_idle()?;
        Ok(text)
    }

    /// Rewrite an imported id into the configured width for its type.
    pub fn normalize_id(&self, object_type: ObjectType, id: &str) -> GrampsId {
        self.ids.template(object_type).normalize(id)
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Fetch an object. Decode and backend errors are logged and read as absent.
    pub fn get<T: Primary>(&self, handle: &Handle) -> Option<T> {
        match self.try_get(handle) {
            Ok(obj) => obj,
            Err(e) => {
                warn!(object_type = %T::TYPE, %handle, error = %e, "failed to read object");
                None
            }
        }
    }

    /// Fetch an object, reporting decode and backend errors.
    pub fn try_get<T: Primary>(&self, handle: &Handle) -> DbResult<Option<T>> {
        Ok(self
            .get_object(T::TYPE, handle)?
            .and_then(T::from_object))
    }

    /// Fetch an object of any type.
    pub fn get_object(
        &self,
        object_type: ObjectType,
        handle: &Handle,
    ) -> DbResult<Option<PrimaryObject>> {
        match self.backend.get(object_type, handle)? {
            Some(row) => Ok(Some(codec::from_row(&row)?)),
            None => Ok(None),
        }
    }

    /// Fetch an object by its user-facing id.
    pub fn get_by_id<T: Primary>(&self, id: &str) -> Option<T> {
        match self.try_get_by_id(id) {
            Ok(obj) => obj,
            Err(e) => {
                warn!(object_type = %T::TYPE, id, error = %e, "failed to read object");
                None
            }
        }
    }

    /// Fetch an object by id, reporting decode and backend errors.
    pub fn try_get_by_id<T: Primary>(&self, id: &str) -> DbResult<Option<T>> {
        match self.backend.handle_for_id(T::TYPE, id)? {
            Some(handle) => self.try_get(&handle),
            None => Ok(None),
        }
    }

    /// Returns `true` if an object of this type has the handle.
    pub fn has_handle(&self, object_type: ObjectType, handle: &Handle) -> DbResult<bool> {
        Ok(self.backend.contains(object_type, handle)?)
    }

    /// Returns `true` if an object of this type carries the id.
    pub fn has_id(&self, object_type: ObjectType, id: &str) -> DbResult<bool> {
        Ok(self.backend.handle_for_id(object_type, id)?.is_some())
    }

    /// Number of stored objects of a type.
    pub fn count(&self, object_type: ObjectType) -> DbResult<usize> {
        Ok(self.backend.count(object_type)?)
    }

    /// Every handle of a type; with `sorted`, in order-key order.
    pub fn handles(&self, object_type: ObjectType, sorted: bool) -> DbResult<Vec<Handle>> {
        Ok(self.backend.handles(object_type, sorted)?)
    }

    /// Every id in use for a type.
    pub fn ids(&self, object_type: ObjectType) -> DbResult<Vec<GrampsId>> {
        Ok(self.backend.ids(object_type)?)
    }

    /// Iterate every object of type `T`.
    pub fn cursor<T: Primary>(&self) -> Cursor<'_, T> {
        Cursor::new(self.raw_cursor(T::TYPE))
    }

    /// Iterate the stored rows of a type without decoding them.
    pub fn raw_cursor(&self, object_type: ObjectType) -> RawCursor<'_> {
        RawCursor::new(self.backend.as_ref(), object_type, self.config.cursor_page_size)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("dbid", &self.dbid)
            .field("backend", &self.backend.kind())
            .field("active_txn", &self.active_txn)
            .field("undo_depth", &self.undo.len())
            .finish()
    }
}

/// Surname a stored person contributes to the surname list.
pub(crate) fn person_surname(object_type: ObjectType, row: &RawRow) -> Option<String> {
    if object_type != ObjectType::Person {
        return None;
    }
    let object = codec::from_row(row).ok()?;
    Person::from_object(object)?
        .list_surname()
        .map(str::to_string)
}

fn check_version(backend: &dyn StorageBackend) -> DbResult<()> {
    match read_meta::<u32>(backend, VERSION_KEY)? {
        Some(found) if found > SCHEMA_VERSION => Err(DbError::VersionTooNew {
            found,
            supported: SCHEMA_VERSION,
        }),
        Some(found) if found < SCHEMA_VERSION => Err(DbError::UpgradeRequired {
            found,
            supported: SCHEMA_VERSION,
        }),
        Some(_) => Ok(()),
        None => {
            if !backend.is_read_only() {
                write_meta(backend, VERSION_KEY, &SCHEMA_VERSION)?;
            }
            Ok(())
        }
    }
}

fn load_ids(backend: &dyn StorageBackend, config: &DbConfig) -> DbResult<IdAllocator> {
    let mut ids = IdAllocator::default();
    for ty in ObjectType::ALL.into_iter().filter(|t| t.has_gramps_id()) {
        let stored = read_meta::<String>(backend, &prefix_key(ty))?;
        let template = match config.prefix_for(ty).or(stored.as_deref()) {
            Some(t) => IdTemplate::validated(t, ty),
            None => IdTemplate::fallback(ty),
        };
        ids.set_template(ty, template);
        ids.set_cursor(ty, read_meta::<u64>(backend, &cursor_key(ty))?.unwrap_or(0));
    }
    Ok(ids)
}
