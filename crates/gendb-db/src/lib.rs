//! The gendb object store.
//!
//! [`Database`] layers the genealogy-specific rules over a
//! [`StorageBackend`](gendb_store::StorageBackend): id allocation,
//! integrity checks on commit, the backlink index, undo/redo, custom-value
//! registries and the surname list, and change notification.
//!
//! ```no_run
//! use gendb_db::{Database, DbConfig};
//! use gendb_types::{Name, Person};
//!
//! # fn main() -> gendb_db::DbResult<()> {
//! let mut db = Database::open(DbConfig::sqlite("family.db"))?;
//! let handle = db.with_transaction("Add Ada", |db, txn| {
//!     let mut ada = Person::new(Name::new("Ada", "Byron"));
//!     db.add(&mut ada, txn, true)
//! })?;
//! assert!(db.get::<Person>(&handle).is_some());
//! db.close()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod cursor;
pub mod database;
pub mod error;
pub mod events;
pub mod ids;
mod maintenance;
pub mod metadata;
pub mod progress;
pub mod reference;
pub mod txn;
pub mod undo;

pub use config::{DbConfig, DEFAULT_UNDO_RETENTION};
pub use cursor::Cursor;
pub use database::{Database, Summary};
pub use error::{DbError, DbResult, IntegrityError};
pub use events::{ChangeKind, DbEvent, EventFilter, EventStream};
pub use ids::{IdAllocator, IdTemplate};
pub use progress::{NoProgress, Progress};
pub use reference::IntegrityReport;
pub use txn::{Operation, Transaction, UndoRecord};
pub use undo::UndoEntry;

#[cfg(test)]
mod tests;
