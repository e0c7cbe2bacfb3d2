use crate::lock::LockId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Caller-chosen identity of an application thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(pub u64);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

impl From<u64> for ThreadId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Locks currently held by a registered thread.
///
/// `read_locks` holds every lock the thread owns in any mode when write
/// holds subsume read holds; otherwise write-mode locks live only in
/// `write_locks`.
#[derive(Debug, Clone)]
pub(crate) struct ThreadState {
    id: ThreadId,
    read_locks: BTreeSet<LockId>,
    write_locks: BTreeSet<LockId>,
}

impl ThreadState {
    pub fn new(id: ThreadId) -> Self {
        Self {
            id,
            read_locks: BTreeSet::new(),
            write_locks: BTreeSet::new(),
        }
    }

    pub fn read_locks(&self) -> &BTreeSet<LockId> {
        &self.read_locks
    }

    pub fn write_locks(&self) -> &BTreeSet<LockId> {
        &self.write_locks
    }

    pub fn acquire(&mut self, lock: LockId, write_mode: bool, write_implies_read: bool) {
        // A re-acquire may switch modes, so start from a clean slate for this lock.
        self.read_locks.remove(&lock);
        self.write_locks.remove(&lock);

        if write_mode {
            self.write_locks.insert(lock);
            if write_implies_read {
                self.read_locks.insert(lock);
            }
        } else {
            self.read_locks.insert(lock);
        }
    }

    pub fn release(&mut self, lock: LockId) {
        self.read_locks.remove(&lock);
        self.write_locks.remove(&lock);
    }

    /// Every lock held, regardless of mode.
    pub fn held_locks(&self) -> BTreeSet<LockId> {
        self.read_locks.union(&self.write_locks).copied().collect()
    }

    pub fn snapshot(&self) -> ThreadSnapshot {
        ThreadSnapshot {
            id: self.id,
            read_locks: self.read_locks.iter().copied().collect(),
            write_locks: self.write_locks.iter().copied().collect(),
        }
    }
}

/// Point-in-time copy of a thread's locksets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadSnapshot {
    pub id: ThreadId,
    pub read_locks: Vec<LockId>,
    pub write_locks: Vec<LockId>,
}
