/// Receives progress from long operations and may cancel them.
///
/// `step` is called between units of work; returning `false` stops the
/// operation with [`DbError::Cancelled`](crate::DbError::Cancelled) at
/// that point.
pub trait Progress {
    fn step(&mut self, phase: &str, done: usize, total: usize) -> bool;
}

impl<F: FnMut(&str, usize, usize) -> bool> Progress for F {
    fn step(&mut self, phase: &str, done: usize, total: usize) -> bool {
        self(phase, done, total)
    }
}

/// Progress sink that never cancels.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn step(&mut self, _phase: &str, _done: usize, _total: usize) -> bool {
        true
    }
}
