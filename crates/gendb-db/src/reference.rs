use std::collections::BTreeSet;

use gendb_store::{codec, RawCursor};
use gendb_types::{Handle, ObjectRef, ObjectType, PrimaryObject, ReferenceEdge};
use tracing::{info, warn};

use crate::database::Database;
use crate::error::{DbError, DbResult};
use crate::progress::Progress;

/// Result of [`Database::check_integrity`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IntegrityReport {
    /// Edges whose target object does not exist.
    pub dangling: Vec<ReferenceEdge>,
    /// Edges implied by stored objects but absent from the reference index.
    pub missing: Vec<ReferenceEdge>,
    /// Edges in the reference index that no stored object implies.
    pub stale: Vec<ReferenceEdge>,
    /// Rows that failed to decode.
    pub undecodable: Vec<ObjectRef>,
}

impl IntegrityReport {
    /// Dangling references are tolerated and do not make a report unclean.
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.stale.is_empty() && self.undecodable.is_empty()
    }
}

impl Database {
    /// Replace the outgoing edges of `object` with what it references now.
    pub(crate) fn update_backlinks(&self, object: &PrimaryObject) -> DbResult<()> {
        self.backend
            .replace_references(&object.object_ref(), &object.referenced_handles())?;
        Ok(())
    }

    /// Objects that reference `handle`, optionally limited to some referrer types.
    ///
    /// Each referrer is reported once, in a stable order.
    pub fn find_backlink_handles(
        &self,
        handle: &Handle,
        include: Option<&[ObjectType]>,
    ) -> DbResult<impl Iterator<Item = ObjectRef>> {
        let referrers: BTreeSet<ObjectRef> = self
            .backend
            .references_to(handle)?
            .into_iter()
            .filter(|e| include.map_or(true, |types| types.contains(&e.referrer_type)))
            .map(|e| ObjectRef::new(e.referrer_type, e.referrer))
            .collect();
        Ok(referrers.into_iter())
    }

    /// Rebuild the reference index from every stored object.
    ///
    /// `progress` is called once per object; returning `false` cancels with
    /// [`DbError::Cancelled`]. Backends without rollback are left with a
    /// partial index after a cancel and should be reindexed again.
    pub fn reindex_reference_map(&mut self, progress: &mut dyn Progress) -> DbResult<()> {
        self.check_idle()?;
        self.backend.begin()?;
        match self.rebuild_references(progress) {
            Ok(edges) => {
                self.backend.commit()?;
                info!(edges, "reference map rebuilt");
                Ok(())
            }
            Err(e) => {
                if let Err(abort) = self.backend.abort() {
                    warn!(error = %abort, "rollback after failed reindex also failed");
                }
                Err(e)
            }
        }
    }

    pub(crate) fn rebuild_references(&self, progress: &mut dyn Progress) -> DbResult<usize> {
        self.backend.clear_references()?;
        let total = self.total_objects()?;
        let mut done = 0;
        let mut edges = 0;
        for ty in ObjectType::ALL {
            for row in RawCursor::new(self.backend.as_ref(), ty, self.config.cursor_page_size) {
                let row = row?;
                match codec::from_row(&row) {
                    Ok(object) => {
                        let refs = object.referenced_handles();
                        edges += refs.len();
                        self.backend.replace_references(&object.object_ref(), &refs)?;
                    }
                    Err(e) => warn!(object_type = %ty, handle = %row.handle, error = %e, "skipping undecodable row"),
                }
                done += 1;
                if !progress.step("reindex", done, total) {
                    return Err(DbError::Cancelled);
                }
            }
        }
        Ok(edges)
    }

    pub(crate) fn total_objects(&self) -> DbResult<usize> {
        let mut total = 0;
        for ty in ObjectType::ALL {
            total += self.backend.count(ty)?;
        }
        Ok(total)
    }

    /// Compare the reference index against the stored objects.
    pub fn check_integrity(&self) -> DbResult<IntegrityReport> {
        let mut report = IntegrityReport::default();
        let mut expected = BTreeSet::new();
        for ty in ObjectType::ALL {
            for row in self.raw_cursor(ty) {
                let row = row?;
                match codec::from_row(&row) {
                    Ok(object) => {
                        let from = object.object_ref();
                        for to in object.referenced_handles() {
                            expected.insert(ReferenceEdge::new(&from, &to));
                        }
                    }
                    Err(_) => report.undecodable.push(ObjectRef::new(ty, row.handle)),
                }
            }
        }
        let actual: BTreeSet<ReferenceEdge> = self.backend.all_references()?.into_iter().collect();

        report.missing = expected.difference(&actual).cloned().collect();
        report.stale = actual.difference(&expected).cloned().collect();
        for edge in &expected {
            if !self.backend.contains(edge.referenced_type, &edge.referenced)? {
                report.dangling.push(edge.clone());
            }
        }
        if !report.is_clean() {
            warn!(
                missing = report.missing.len(),
                stale = report.stale.len(),
                undecodable = report.undecodable.len(),
                "integrity check found problems"
            );
        }
        Ok(report)
    }
}
