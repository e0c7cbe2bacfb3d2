//! Lockset arithmetic used by the common-lock test.

use crate::lock::LockId;
use std::collections::BTreeSet;

/// Borrowed view of one thread's read-mode and write-mode locksets.
#[derive(Debug, Clone, Copy)]
pub struct LocksetView<'a> {
    pub read: &'a BTreeSet<LockId>,
    pub write: &'a BTreeSet<LockId>,
}

impl<'a> LocksetView<'a> {
    pub fn new(read: &'a BTreeSet<LockId>, write: &'a BTreeSet<LockId>) -> Self {
        Self { read, write }
    }
}

pub fn intersect(a: &BTreeSet<LockId>, b: &BTreeSet<LockId>) -> BTreeSet<LockId> {
    a.intersection(b).copied().collect()
}

pub fn intersects(a: &BTreeSet<LockId>, b: &BTreeSet<LockId>) -> bool {
    // Iterate the smaller set, probe the larger.
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small.iter().any(|lock| large.contains(lock))
}

/// True iff any read×read, write×read, read×write or write×write pairing
/// between the two threads' locksets shares a lock.
pub fn has_common_locks(first: LocksetView<'_>, second: LocksetView<'_>) -> bool {
    intersects(first.read, second.read)
        || intersects(first.write, second.read)
        || intersects(first.read, second.write)
        || intersects(first.write, second.write)
}
