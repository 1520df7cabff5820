//! Whole-database passes: rebuilding derived data and copying between backends.

use gendb_store::{codec, RawCursor, RawRow};
use gendb_types::ObjectType;
use tracing::{info, warn};

use crate::database::{person_surname, Database, DBID_KEY};
use crate::error::{DbError, DbResult};
use crate::progress::Progress;

impl Database {
    /// Recompute order keys, custom-value registries and the surname list
    /// from the stored objects.
    pub fn rebuild_secondary(&mut self, progress: &mut dyn Progress) -> DbResult<()> {
        self.check_idle()?;
        self.backend.begin()?;
        let rebuilt = self
            .rebuild_secondary_rows(progress)
            .and_then(|updated| {
                self.persist_state()?;
                self.backend.commit()?;
                Ok(updated)
            });
        match rebuilt {
            Ok(updated) => {
                info!(updated, "secondary data rebuilt");
                Ok(())
            }
            Err(e) => {
                if let Err(abort) = self.backend.abort() {
                    warn!(error = %abort, "rollback after failed rebuild also failed");
                }
                self.reload_state()?;
                Err(e)
            }
        }
    }

    fn rebuild_secondary_rows(&mut self, progress: &mut dyn Progress) -> DbResult<usize> {
        self.secondary.clear();
        let total = self.total_objects()?;
        let mut done = 0;
        let mut updated = 0;
        for ty in ObjectType::ALL {
            for row in RawCursor::new(self.backend.as_ref(), ty, self.config.cursor_page_size) {
                let row = row?;
                match codec::from_row(&row) {
                    Ok(object) => {
                        let order_by = self.order_key(&object)?;
                        object.record_custom_values(&mut self.secondary);
                        self.secondary
                            .replace_surname(None, person_surname(ty, &row));
                        if order_by != row.order_by {
                            self.backend.put(ty, &RawRow { order_by, ..row })?;
                            updated += 1;
                        }
                    }
                    Err(e) => {
                        warn!(object_type = %ty, handle = %row.handle, error = %e, "skipping undecodable row");
                    }
                }
                done += 1;
                if !progress.step("rebuild", done, total) {
                    return Err(DbError::Cancelled);
                }
            }
        }
        Ok(updated)
    }

    /// Copy every object, metadata entry and name group from `source`.
    ///
    /// The target must be empty. Backlinks are rebuilt afterwards, and the
    /// undo history of the target is discarded. The target keeps its own
    /// database id.
    pub fn copy_from(&mut self, source: &Database, progress: &mut dyn Progress) -> DbResult<()> {
        self.check_idle()?;
        if !self.is_empty()? {
            return Err(DbError::Config("copy target is not empty".into()));
        }
        self.backend.begin()?;
        match self.copy_rows(source, progress) {
            Ok(copied) => {
                self.backend.commit()?;
                self.reload_state()?;
                self.undo.batch_started();
                info!(copied, from = %source.dbid(), "database copied");
                Ok(())
            }
            Err(e) => {
                if let Err(abort) = self.backend.abort() {
                    warn!(error = %abort, "rollback after failed copy also failed");
                }
                self.reload_state()?;
                Err(e)
            }
        }
    }

    fn copy_rows(&mut self, source: &Database, progress: &mut dyn Progress) -> DbResult<usize> {
        let total = source.total_objects()?;
        let mut done = 0;
        for ty in ObjectType::ALL {
            for row in source.raw_cursor(ty) {
                self.backend.put(ty, &row?)?;
                done += 1;
                if !progress.step("copy", done, total) {
                    return Err(DbError::Cancelled);
                }
            }
        }
        for key in source.backend.metadata_keys()? {
            if key == DBID_KEY {
                continue;
            }
            if let Some(value) = source.backend.get_metadata(&key)? {
                self.backend.set_metadata(&key, &value)?;
            }
        }
        for name in source.backend.name_group_keys()? {
            if let Some(group) = source.backend.get_name_group(&name)? {
                self.backend.set_name_group(&name, Some(&group))?;
            }
        }
        self.rebuild_references(progress)?;
        Ok(done)
    }
}
