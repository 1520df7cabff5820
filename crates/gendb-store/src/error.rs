use std::path::PathBuf;

/// Errors from storage backends and the raw-form codec.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A raw form could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A stored record was written by a newer schema than this build understands.
    #[error("record schema {found} is newer than supported schema {supported}")]
    SchemaTooNew { found: u32, supported: u32 },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("SQLite error on {path}: {source}")]
    Sqlite {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    /// The log file contains a record that cannot be replayed.
    #[error("corrupt log at offset {offset}: {reason}")]
    Corrupt { offset: u64, reason: String },

    /// The backend was opened read-only.
    #[error("backend is read-only")]
    ReadOnly,

    #[error("backend lock poisoned")]
    LockPoisoned,

    /// The backend configuration cannot be satisfied.
    #[error("invalid backend configuration: {0}")]
    InvalidConfig(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
