use gendb_store::StoreError;
use gendb_types::{Handle, ObjectType};

/// A write that would break an invariant of the object store.
#[derive(Debug, thiserror::Error)]
pub enum IntegrityError {
    /// The id is already carried by another object of the same type.
    #[error("{object_type} id {id} is already used by {existing}")]
    DuplicateId {
        object_type: ObjectType,
        id: String,
        existing: Handle,
    },

    /// A reference names a handle that exists, but as a different type.
    #[error("{referrer} refers to {handle} as a {expected}, but it is a {actual}")]
    ImpossibleReference {
        referrer: Handle,
        handle: Handle,
        expected: ObjectType,
        actual: ObjectType,
    },

    #[error("cannot commit a {0} without a handle")]
    EmptyHandle(ObjectType),

    /// The handle already belongs to an object of another type.
    #[error("handle {handle} of this {object_type} already belongs to a {existing}")]
    HandleInUse {
        handle: Handle,
        object_type: ObjectType,
        existing: ObjectType,
    },
}

/// Errors from database operations.
///
/// Missing objects are not errors: lookups return `Option`.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("integrity error: {0}")]
    Integrity(#[from] IntegrityError),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("backend error: {0}")]
    Backend(StoreError),

    #[error("database is read-only")]
    ReadOnly,

    #[error("database schema {found} is newer than supported schema {supported}")]
    VersionTooNew { found: u32, supported: u32 },

    #[error("database schema {found} is older than {supported}; upgrade required")]
    UpgradeRequired { found: u32, supported: u32 },

    #[error("another transaction is already active")]
    TransactionActive,

    #[error("transaction is not the active transaction")]
    StaleTransaction,

    #[error("transaction was aborted after a failed write")]
    TransactionAborted,

    #[error("changes cannot be abandoned")]
    AbandonNotPossible,

    #[error("operation cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<StoreError> for DbError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::ReadOnly => DbError::ReadOnly,
            StoreError::Serialization(msg) => DbError::Serialization(msg),
            other => DbError::Backend(other),
        }
    }
}

impl From<serde_json::Error> for DbError {
    fn from(e: serde_json::Error) -> Self {
        DbError::Serialization(e.to_string())
    }
}

/// Result alias for database operations.
pub type DbResult<T> = Result<T, DbError>;
