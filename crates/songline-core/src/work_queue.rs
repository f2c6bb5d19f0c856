//! Lock-free work queue for spreading catalog items across phase workers

use std::sync::atomic::{AtomicUsize, Ordering};

/// Hands out items in catalog order, each exactly once.
///
/// Workers call [`next()`](WorkQueue::next) to claim the next item together
/// with its catalog index, so results can be put back in order afterwards.
pub struct WorkQueue<'a, S> {
    items: &'a [S],
    cursor: AtomicUsize,
}

impl<'a, S> WorkQueue<'a, S> {
    pub fn new(items: &'a [S]) -> Self {
        Self {
            items,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Claim the next item (lock-free)
    pub fn next(&self) -> Option<(usize, &'a S)> {
        let i = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.items.get(i).map(|item| (i, item))
    }

    pub fn total(&self) -> usize {
        self.items.len()
    }
}
