//! Durable backend on an embedded SQLite database.
//!
//! Layout:
//!
//! ```text
//! <type>     (handle TEXT PRIMARY KEY, order_by TEXT, gramps_id TEXT, raw_form BLOB)
//! reference  (referrer_handle, referrer_type, referenced_handle, referenced_type)
//! metadata   (key TEXT PRIMARY KEY, value TEXT)
//! name_group (name TEXT PRIMARY KEY, grouping TEXT)
//! ```
//!
//! One table per object type, named by [`ObjectType::table_name`]. Writes
//! outside an explicit transaction autocommit.

use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use gendb_types::{GrampsId, Handle, ObjectRef, ObjectType, ReferenceEdge};
use rusqlite::{params, Connection, OpenFlags};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::{BackendKind, RawRow, StorageBackend};

struct SqliteState {
    conn: Connection,
    in_txn: bool,
}

pub struct SqliteBackend {
    label: String,
    read_only: bool,
    state: Mutex<SqliteState>,
}

impl SqliteBackend {
    /// Open (or create) a database file.
    pub fn open(path: &Path, read_only: bool) -> StoreResult<Self> {
        let label = path.display().to_string();
        let conn = if read_only {
            Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        } else {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
            }
            Connection::open(path)
        }
        .map_err(|source| StoreError::Sqlite {
            path: label.clone(),
            source,
        })?;
        Self::from_connection(conn, label, read_only)
    }

    /// A private in-memory SQLite database, for tests.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(|source| StoreError::Sqlite {
            path: ":memory:".into(),
            source,
        })?;
        Self::from_connection(conn, ":memory:".into(), false)
    }

    fn from_connection(conn: Connection, label: String, read_only: bool) -> StoreResult<Self> {
        let backend = Self {
            label,
            read_only,
            state: Mutex::new(SqliteState {
                conn,
                in_txn: false,
            }),
        };
        if !read_only {
            backend.init_schema()?;
        }
        debug!(path = %backend.label, read_only, "opened sqlite backend");
        Ok(backend)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let mut ddl = String::new();
        for ty in ObjectType::ALL {
            let t = ty.table_name();
            ddl.push_str(&format!(
                "CREATE TABLE IF NOT EXISTS {t} (
                    handle TEXT PRIMARY KEY NOT NULL,
                    order_by TEXT NOT NULL DEFAULT '',
                    gramps_id TEXT NOT NULL DEFAULT '',
                    raw_form BLOB NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_{t}_order_by ON {t}(order_by);
                CREATE INDEX IF NOT EXISTS idx_{t}_gramps_id ON {t}(gramps_id);
                "
            ));
        }
        ddl.push_str(
            r#"
            CREATE TABLE IF NOT EXISTS reference (
                referrer_handle TEXT NOT NULL,
                referrer_type TEXT NOT NULL,
                referenced_handle TEXT NOT NULL,
                referenced_type TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_reference_referenced ON reference(referenced_handle);
            CREATE INDEX IF NOT EXISTS idx_reference_referrer ON reference(referrer_handle);

            CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS name_group (
                name TEXT PRIMARY KEY NOT NULL,
                grouping TEXT NOT NULL
            );
            "#,
        );
        let state = self.lock()?;
        state.conn.execute_batch(&ddl).map_err(|e| self.sql(e))
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, SqliteState>> {
        self.state.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn writable(&self) -> StoreResult<MutexGuard<'_, SqliteState>> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        self.lock()
    }

    fn sql(&self, source: rusqlite::Error) -> StoreError {
        StoreError::Sqlite {
            path: self.label.clone(),
            source,
        }
    }

    fn query_strings(&self, sql: &str) -> StoreResult<Vec<String>> {
        let state = self.lock()?;
        let mut stmt = state.conn.prepare(sql).map_err(|e| self.sql(e))?;
        let rows = stmt
            .query_map([], |r| r.get::<_, String>(0))
            .map_err(|e| self.sql(e))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(|e| self.sql(e))
    }

    fn query_edges(&self, sql: &str, handle: Option<&Handle>) -> StoreResult<Vec<ReferenceEdge>> {
        let raw: Vec<(String, String, String, String)> = {
            let state = self.lock()?;
            let mut stmt = state.conn.prepare(sql).map_err(|e| self.sql(e))?;
            let map = |r: &rusqlite::Row| -> rusqlite::Result<(String, String, String, String)> {
                Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?))
            };
            let rows = match handle {
                Some(h) => stmt.query_map(params![h.as_str()], map),
                None => stmt.query_map([], map),
            }
            .map_err(|e| self.sql(e))?;
            rows.collect::<Result<Vec<_>, _>>().map_err(|e| self.sql(e))?
        };
        let mut edges = raw
            .into_iter()
            .map(|(from, from_ty, to, to_ty)| {
                Ok(ReferenceEdge {
                    referrer: Handle::from(from),
                    referrer_type: parse_type(&from_ty)?,
                    referenced: Handle::from(to),
                    referenced_type: parse_type(&to_ty)?,
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;
        edges.sort();
        edges.dedup();
        Ok(edges)
    }
}

fn parse_type(name: &str) -> StoreResult<ObjectType> {
    ObjectType::from_str(name).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn row_from_sql(r: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        handle: Handle::from(r.get::<_, String>(0)?),
        gramps_id: r.get(1)?,
        order_by: r.get(2)?,
        data: r.get(3)?,
    })
}

impl StorageBackend for SqliteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn get(&self, object_type: ObjectType, handle: &Handle) -> StoreResult<Option<RawRow>> {
        let state = self.lock()?;
        let sql = format!(
            "SELECT handle, gramps_id, order_by, raw_form FROM {} WHERE handle = ?1",
            object_type.table_name()
        );
        match state
            .conn
            .query_row(&sql, params![handle.as_str()], row_from_sql)
        {
            Ok(row) => Ok(Some(row)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(self.sql(e)),
        }
    }

    fn put(&self, object_type: ObjectType, row: &RawRow) -> StoreResult<()> {
        let state = self.writable()?;
        let sql = format!(
            "INSERT OR REPLACE INTO {} (handle, order_by, gramps_id, raw_form) VALUES (?1, ?2, ?3, ?4)",
            object_type.table_name()
        );
        state
            .conn
            .execute(
                &sql,
                params![row.handle.as_str(), row.order_by, row.gramps_id, row.data],
            )
            .map_err(|e| self.sql(e))?;
        Ok(())
    }

    fn delete(&self, object_type: ObjectType, handle: &Handle) -> StoreResult<bool> {
        let state = self.writable()?;
        let sql = format!("DELETE FROM {} WHERE handle = ?1", object_type.table_name());
        let n = state
            .conn
            .execute(&sql, params![handle.as_str()])
            .map_err(|e| self.sql(e))?;
        Ok(n > 0)
    }

    fn handle_for_id(&self, object_type: ObjectType, id: &str) -> StoreResult<Option<Handle>> {
        if id.is_empty() {
            return Ok(None);
        }
        let state = self.lock()?;
        let sql = format!(
            "SELECT handle FROM {} WHERE gramps_id = ?1 ORDER BY handle LIMIT 1",
            object_type.table_name()
        );
        match state
            .conn
            .query_row(&sql, params![id], |r| r.get::<_, String>(0))
        {
            Ok(h) => Ok(Some(Handle::from(h))),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(self.sql(e)),
        }
    }

    fn count(&self, object_type: ObjectType) -> StoreResult<usize> {
        let state = self.lock()?;
        let sql = format!("SELECT COUNT(*) FROM {}", object_type.table_name());
        let n: i64 = state
            .conn
            .query_row(&sql, [], |r| r.get(0))
            .map_err(|e| self.sql(e))?;
        Ok(n as usize)
    }

    fn handles(&self, object_type: ObjectType, sorted: bool) -> StoreResult<Vec<Handle>> {
        let order = if sorted { "order_by, handle" } else { "handle" };
        let sql = format!(
            "SELECT handle FROM {} ORDER BY {order}",
            object_type.table_name()
        );
        Ok(self
            .query_strings(&sql)?
            .into_iter()
            .map(Handle::from)
            .collect())
    }

    fn ids(&self, object_type: ObjectType) -> StoreResult<Vec<GrampsId>> {
        let sql = format!(
            "SELECT DISTINCT gramps_id FROM {} WHERE gramps_id != '' ORDER BY gramps_id",
            object_type.table_name()
        );
        Ok(self
            .query_strings(&sql)?
            .into_iter()
            .map(GrampsId::from)
            .collect())
    }

    fn scan_page(
        &self,
        object_type: ObjectType,
        after: Option<&Handle>,
        limit: usize,
    ) -> StoreResult<Vec<RawRow>> {
        let state = self.lock()?;
        let sql = format!(
            "SELECT handle, gramps_id, order_by, raw_form FROM {} WHERE handle > ?1 ORDER BY handle LIMIT ?2",
            object_type.table_name()
        );
        let after = after.map(Handle::as_str).unwrap_or("");
        let mut stmt = state.conn.prepare(&sql).map_err(|e| self.sql(e))?;
        let rows = stmt
            .query_map(params![after, limit as i64], row_from_sql)
            .map_err(|e| self.sql(e))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(|e| self.sql(e))
    }

    fn replace_references(
        &self,
        referrer: &ObjectRef,
        targets: &BTreeSet<ObjectRef>,
    ) -> StoreResult<()> {
        let mut state = self.writable()?;
        let sp = state.conn.savepoint().map_err(|e| self.sql(e))?;
        sp.execute(
            "DELETE FROM reference WHERE referrer_handle = ?1",
            params![referrer.handle.as_str()],
        )
        .map_err(|e| self.sql(e))?;
        {
            let mut insert = sp
                .prepare(
                    "INSERT INTO reference (referrer_handle, referrer_type, referenced_handle, referenced_type)
                     VALUES (?1, ?2, ?3, ?4)",
                )
                .map_err(|e| self.sql(e))?;
            for target in targets {
                insert
                    .execute(params![
                        referrer.handle.as_str(),
                        referrer.object_type.class_name(),
                        target.handle.as_str(),
                        target.object_type.class_name(),
                    ])
                    .map_err(|e| self.sql(e))?;
            }
        }
        sp.commit().map_err(|e| self.sql(e))
    }

    fn delete_references_from(&self, referrer: &Handle) -> StoreResult<()> {
        let state = self.writable()?;
        state
            .conn
            .execute(
                "DELETE FROM reference WHERE referrer_handle = ?1",
                params![referrer.as_str()],
            )
            .map_err(|e| self.sql(e))?;
        Ok(())
    }

    fn references_to(&self, handle: &Handle) -> StoreResult<Vec<ReferenceEdge>> {
        self.query_edges(
            "SELECT referrer_handle, referrer_type, referenced_handle, referenced_type
             FROM reference WHERE referenced_handle = ?1",
            Some(handle),
        )
    }

    fn references_from(&self, handle: &Handle) -> StoreResult<Vec<ReferenceEdge>> {
        self.query_edges(
            "SELECT referrer_handle, referrer_type, referenced_handle, referenced_type
             FROM reference WHERE referrer_handle = ?1",
            Some(handle),
        )
    }

    fn all_references(&self) -> StoreResult<Vec<ReferenceEdge>> {
        self.query_edges(
            "SELECT referrer_handle, referrer_type, referenced_handle, referenced_type FROM reference",
            None,
        )
    }

    fn clear_references(&self) -> StoreResult<()> {
        let state = self.writable()?;
        state
            .conn
            .execute("DELETE FROM reference", [])
            .map_err(|e| self.sql(e))?;
        Ok(())
    }

    fn get_metadata(&self, key: &str) -> StoreResult<Option<String>> {
        let state = self.lock()?;
        match state.conn.query_row(
            "SELECT value FROM metadata WHERE key = ?1",
            params![key],
            |r| r.get::<_, String>(0),
        ) {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(self.sql(e)),
        }
    }

    fn set_metadata(&self, key: &str, value: &str) -> StoreResult<()> {
        let state = self.writable()?;
        state
            .conn
            .execute(
                "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
                params![key, value],
            )
            .map_err(|e| self.sql(e))?;
        Ok(())
    }

    fn metadata_keys(&self) -> StoreResult<Vec<String>> {
        self.query_strings("SELECT key FROM metadata ORDER BY key")
    }

    fn get_name_group(&self, name: &str) -> StoreResult<Option<String>> {
        let state = self.lock()?;
        match state.conn.query_row(
            "SELECT grouping FROM name_group WHERE name = ?1",
            params![name],
            |r| r.get::<_, String>(0),
        ) {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(self.sql(e)),
        }
    }

    fn set_name_group(&self, name: &str, group: Option<&str>) -> StoreResult<()> {
        let state = self.writable()?;
        let result = match group {
            Some(g) => state.conn.execute(
                "INSERT OR REPLACE INTO name_group (name, grouping) VALUES (?1, ?2)",
                params![name, g],
            ),
            None => state
                .conn
                .execute("DELETE FROM name_group WHERE name = ?1", params![name]),
        };
        result.map_err(|e| self.sql(e))?;
        Ok(())
    }

    fn name_group_keys(&self) -> StoreResult<Vec<String>> {
        self.query_strings("SELECT name FROM name_group ORDER BY name")
    }

    fn begin(&self) -> StoreResult<()> {
        if self.read_only {
            return Ok(());
        }
        let mut state = self.lock()?;
        if !state.in_txn {
            state.conn.execute_batch("BEGIN").map_err(|e| self.sql(e))?;
            state.in_txn = true;
        }
        Ok(())
    }

    fn commit(&self) -> StoreResult<()> {
        let mut state = self.lock()?;
        if state.in_txn {
            state.conn.execute_batch("COMMIT").map_err(|e| self.sql(e))?;
            state.in_txn = false;
        }
        Ok(())
    }

    fn abort(&self) -> StoreResult<bool> {
        let mut state = self.lock()?;
        if !state.in_txn {
            return Ok(false);
        }
        state.conn.execute_batch("ROLLBACK").map_err(|e| self.sql(e))?;
        state.in_txn = false;
        Ok(true)
    }

    fn close(&self) -> StoreResult<()> {
        self.commit()?;
        debug!(path = %self.label, "closed sqlite backend");
        Ok(())
    }
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("path", &self.label)
            .field("read_only", &self.read_only)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(handle: &str, order: &str) -> RawRow {
        RawRow {
            handle: Handle::from(handle),
            gramps_id: String::new(),
            order_by: order.to_string(),
            data: b"{}".to_vec(),
        }
    }

    #[test]
    fn abort_rolls_back_writes() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        backend.begin().unwrap();
        backend.put(ObjectType::Tag, &row("t1", "a")).unwrap();
        assert!(backend.abort().unwrap());
        assert_eq!(backend.count(ObjectType::Tag).unwrap(), 0);
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree.db");
        {
            let backend = SqliteBackend::open(&path, false).unwrap();
            backend.begin().unwrap();
            backend.put(ObjectType::Tag, &row("t1", "a")).unwrap();
            backend.set_metadata("version", "1").unwrap();
            backend.commit().unwrap();
            backend.close().unwrap();
        }
        let backend = SqliteBackend::open(&path, true).unwrap();
        assert!(backend.contains(ObjectType::Tag, &Handle::from("t1")).unwrap());
        assert_eq!(backend.get_metadata("version").unwrap().as_deref(), Some("1"));
        assert!(matches!(
            backend.put(ObjectType::Tag, &row("t2", "b")),
            Err(StoreError::ReadOnly)
        ));
    }

    #[test]
    fn reference_types_round_trip_through_text_columns() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let from = ObjectRef::new(ObjectType::Citation, Handle::from("c1"));
        let targets: BTreeSet<_> = [ObjectRef::new(ObjectType::Source, Handle::from("s1"))].into();
        backend.replace_references(&from, &targets).unwrap();
        let edges = backend.references_to(&Handle::from("s1")).unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].referrer_type, ObjectType::Citation);
        assert_eq!(edges[0].referenced_type, ObjectType::Source);
    }
}
