use std::collections::BTreeSet;
use std::fmt;

use gendb_types::{GrampsId, Handle, ObjectRef, ObjectType, ReferenceEdge};
use serde::{Deserialize, Serialize};

use crate::error::StoreResult;

/// One stored record: the encoded object plus the columns kept beside it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRow {
    pub handle: Handle,
    /// Empty when the object has no user-facing id.
    pub gramps_id: String,
    /// Collation key used for sorted listing.
    pub order_by: String,
    pub data: Vec<u8>,
}

/// Which adapter is behind a [`StorageBackend`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Memory,
    Sqlite,
    #[serde(alias = "log")]
    LogFile,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Memory => "memory",
            Self::Sqlite => "sqlite",
            Self::LogFile => "logfile",
        })
    }
}

/// Storage contract shared by every backend.
///
/// A backend is a set of per-type tables keyed by handle, a reference
/// (backlink) table, a metadata table and a name-group table. It never
/// interprets the encoded object: order keys and ids arrive precomputed
/// in the [`RawRow`].
///
/// All implementations must behave identically for every observable
/// operation. Sorted listings order by `(order_by, handle)` and every
/// other listing by handle or edge order, so results never depend on hash
/// iteration order.
pub trait StorageBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn is_read_only(&self) -> bool;

    // --- object tables ---

    fn get(&self, object_type: ObjectType, handle: &Handle) -> StoreResult<Option<RawRow>>;

    /// Insert or replace the row with `row.handle`.
    fn put(&self, object_type: ObjectType, row: &RawRow) -> StoreResult<()>;

    /// Delete a row. Returns `true` if it existed.
    fn delete(&self, object_type: ObjectType, handle: &Handle) -> StoreResult<bool>;

    fn contains(&self, object_type: ObjectType, handle: &Handle) -> StoreResult<bool> {
        Ok(self.get(object_type, handle)?.is_some())
    }

    fn handle_for_id(&self, object_type: ObjectType, id: &str) -> StoreResult<Option<Handle>>;

    fn count(&self, object_type: ObjectType) -> StoreResult<usize>;

    /// Every handle of a type, by handle or by `(order_by, handle)` when `sorted`.
    fn handles(&self, object_type: ObjectType, sorted: bool) -> StoreResult<Vec<Handle>>;

    /// Every non-empty id of a type, ascending.
    fn ids(&self, object_type: ObjectType) -> StoreResult<Vec<GrampsId>>;

    /// Up to `limit` rows with handle strictly greater than `after`, by handle.
    fn scan_page(
        &self,
        object_type: ObjectType,
        after: Option<&Handle>,
        limit: usize,
    ) -> StoreResult<Vec<RawRow>>;

    // --- reference table ---

    /// Replace every edge whose referrer is `referrer` with edges to `targets`.
    fn replace_references(
        &self,
        referrer: &ObjectRef,
        targets: &BTreeSet<ObjectRef>,
    ) -> StoreResult<()>;

    fn delete_references_from(&self, referrer: &Handle) -> StoreResult<()>;

    /// Edges pointing at `handle`, in edge order.
    fn references_to(&self, handle: &Handle) -> StoreResult<Vec<ReferenceEdge>>;

    /// Edges leaving `handle`, in edge order.
    fn references_from(&self, handle: &Handle) -> StoreResult<Vec<ReferenceEdge>>;

    fn all_references(&self) -> StoreResult<Vec<ReferenceEdge>>;

    fn clear_references(&self) -> StoreResult<()>;

    // --- metadata and name groups ---

    fn get_metadata(&self, key: &str) -> StoreResult<Option<String>>;

    fn set_metadata(&self, key: &str, value: &str) -> StoreResult<()>;

    fn metadata_keys(&self) -> StoreResult<Vec<String>>;

    fn get_name_group(&self, name: &str) -> StoreResult<Option<String>>;

    /// Map `name` to `group`, or remove the mapping when `group` is `None`.
    fn set_name_group(&self, name: &str, group: Option<&str>) -> StoreResult<()>;

    fn name_group_keys(&self) -> StoreResult<Vec<String>>;

    // --- transactions ---

    fn begin(&self) -> StoreResult<()>;

    /// Make everything since [`begin`](Self::begin) durable.
    fn commit(&self) -> StoreResult<()>;

    /// Discard uncommitted changes where the backend can.
    ///
    /// Returns `true` if changes were rolled back, `false` if the backend
    /// has no rollback and the writes stand.
    fn abort(&self) -> StoreResult<bool>;

    /// Flush and release resources. Further calls are undefined.
    fn close(&self) -> StoreResult<()>;
}
