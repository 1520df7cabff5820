use std::collections::VecDeque;

use gendb_types::{Handle, ObjectType};

use crate::error::StoreResult;
use crate::traits::{RawRow, StorageBackend};

/// Default number of rows fetched per page.
pub const DEFAULT_PAGE_SIZE: usize = 256;

/// Lazy, restartable iteration over one object table in handle order.
///
/// Rows are fetched a page at a time by keyset paging on the handle, so the
/// cursor holds no backend lock between pages. Rows added behind the cursor
/// position are not visited. An error ends the iteration after it is
/// yielded.
pub struct RawCursor<'a> {
    backend: &'a dyn StorageBackend,
    object_type: ObjectType,
    page_size: usize,
    buffer: VecDeque<RawRow>,
    last: Option<Handle>,
    done: bool,
}

impl<'a> RawCursor<'a> {
    /// Cursor over `object_type`, fetching `page_size` rows at a time.
    pub fn new(backend: &'a dyn StorageBackend, object_type: ObjectType, page_size: usize) -> Self {
        Self {
            backend,
            object_type,
            page_size: page_size.max(1),
            buffer: VecDeque::new(),
            last: None,
            done: false,
        }
    }

    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    /// Start over from the first row.
    pub fn restart(&mut self) {
        self.buffer.clear();
        self.last = None;
        self.done = false;
    }

    fn fill(&mut self) -> StoreResult<()> {
        let page = self
            .backend
            .scan_page(self.object_type, self.last.as_ref(), self.page_size)?;
        if page.len() < self.page_size {
            self.done = true;
        }
        if let Some(last) = page.last() {
            self.last = Some(last.handle.clone());
        }
        self.buffer.extend(page);
        Ok(())
    }
}

impl Iterator for RawCursor<'_> {
    type Item = StoreResult<RawRow>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.done {
            if let Err(e) = self.fill() {
                self.done = true;
                return Some(Err(e));
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}
