use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use gendb_store::{BackendConfig, DEFAULT_PAGE_SIZE};
use gendb_types::ObjectType;
use serde::{Deserialize, Serialize};

use crate::error::{DbError, DbResult};

/// Number of transactions kept for undo.
pub const DEFAULT_UNDO_RETENTION: usize = 1000;

/// Configuration for opening a [`Database`](crate::Database).
///
/// ```toml
/// undo_retention = 1000
///
/// [backend]
/// kind = "sqlite"
/// path = "family.db"
///
/// [id_prefixes]
/// person = "I%04d"
/// family = "F%04d"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    pub backend: BackendConfig,
    /// Transactions retained for undo before the oldest are dropped.
    pub undo_retention: usize,
    /// Rows fetched per page by cursors.
    pub cursor_page_size: usize,
    /// Id templates keyed by lower-case type name. These override any
    /// template stored in the database.
    pub id_prefixes: BTreeMap<String, String>,
    /// Buffer size of each observer channel.
    pub event_capacity: usize,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            undo_retention: DEFAULT_UNDO_RETENTION,
            cursor_page_size: DEFAULT_PAGE_SIZE,
            id_prefixes: BTreeMap::new(),
            event_capacity: 256,
        }
    }
}

impl DbConfig {
    /// An in-memory database with default settings.
    pub fn memory() -> Self {
        Self::default()
    }

    /// A SQLite database at `path`.
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: BackendConfig::sqlite(path),
            ..Default::default()
        }
    }

    /// A log-file database at `path`.
    pub fn logfile(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: BackendConfig::logfile(path),
            ..Default::default()
        }
    }

    pub fn read_only(mut self) -> Self {
        self.backend.read_only = true;
        self
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> DbResult<Self> {
        toml::from_str(text).map_err(|e| DbError::Config(e.to_string()))
    }

    /// Read a TOML configuration file.
    pub fn load(path: &Path) -> DbResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| DbError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Configured id template for `object_type`, if any.
    pub fn prefix_for(&self, object_type: ObjectType) -> Option<&str> {
        self.id_prefixes
            .get(object_type.table_name())
            .map(String::as_str)
    }
}
