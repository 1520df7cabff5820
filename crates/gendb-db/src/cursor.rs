use std::marker::PhantomData;

use gendb_store::{codec, RawCursor};
use gendb_types::{Handle, Primary};
use tracing::warn;

use crate::error::DbResult;

/// Typed iteration over every object of one type, in handle order.
///
/// Rows that fail to decode are logged and skipped. Backend errors are
/// yielded and end the iteration.
pub struct Cursor<'a, T> {
    raw: RawCursor<'a>,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T: Primary> Cursor<'a, T> {
    pub(crate) fn new(raw: RawCursor<'a>) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    /// Start over from the first object.
    pub fn restart(&mut self) {
        self.raw.restart();
    }
}

impl<T: Primary> Iterator for Cursor<'_, T> {
    type Item = DbResult<(Handle, T)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let row = match self.raw.next()? {
                Ok(row) => row,
                Err(e) => return Some(Err(e.into())),
            };
            match codec::from_row(&row).map(T::from_object) {
                Ok(Some(obj)) => return Some(Ok((row.handle, obj))),
                Ok(None) => {
                    warn!(object_type = %T::TYPE, handle = %row.handle, "row holds another object type; skipped");
                }
                Err(e) => {
                    warn!(object_type = %T::TYPE, handle = %row.handle, error = %e, "undecodable row skipped");
                }
            }
        }
    }
}
