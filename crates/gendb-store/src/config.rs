use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{StoreError, StoreResult};
use crate::logfile::LogFileBackend;
use crate::memory::InMemoryBackend;
use crate::sqlite::SqliteBackend;
use crate::traits::{BackendKind, StorageBackend};

/// When the log-file backend forces data to disk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// `fsync` at every transaction commit.
    #[default]
    EveryCommit,
    /// Flush to the OS at commit and let it schedule the write.
    OsDefault,
}

/// Selects and parameterizes a backend.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: BackendKind,
    /// Database file. Required for every kind except `memory`.
    pub path: Option<PathBuf>,
    pub read_only: bool,
    pub sync_mode: SyncMode,
}

impl BackendConfig {
    pub fn memory() -> Self {
        Self::default()
    }

    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: BackendKind::Sqlite,
            path: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn logfile(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: BackendKind::LogFile,
            path: Some(path.into()),
            ..Default::default()
        }
    }

    fn require_path(&self) -> StoreResult<&PathBuf> {
        self.path
            .as_ref()
            .ok_or_else(|| StoreError::InvalidConfig(format!("the {} backend needs a path", self.kind)))
    }
}

/// Open the backend described by `config`.
pub fn open_backend(config: &BackendConfig) -> StoreResult<Box<dyn StorageBackend>> {
    let backend: Box<dyn StorageBackend> = match config.kind {
        BackendKind::Memory => {
            if config.read_only {
                return Err(StoreError::InvalidConfig(
                    "an in-memory backend cannot be read-only".into(),
                ));
            }
            Box::new(InMemoryBackend::new())
        }
        BackendKind::Sqlite => Box::new(SqliteBackend::open(
            config.require_path()?,
            config.read_only,
        )?),
        BackendKind::LogFile => Box::new(LogFileBackend::open(
            config.require_path()?,
            config.read_only,
            config.sync_mode,
        )?),
    };
    info!(kind = %config.kind, path = ?config.path, read_only = config.read_only, "backend opened");
    Ok(backend)
}
