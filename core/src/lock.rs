use crate::thread::ThreadId;
use crate::variable::VariableHandle;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Caller-chosen identity of a lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockId(pub u64);

impl fmt::Display for LockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

impl From<u64> for LockId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Ownership record for one lock. At most one holder at a time.
#[derive(Debug, Clone)]
pub(crate) struct LockState {
    id: LockId,
    holder: Option<ThreadId>,
    write_mode: bool,
    guarded_variable: Option<VariableHandle>,
}

impl LockState {
    pub fn new(id: LockId) -> Self {
        Self {
            id,
            holder: None,
            write_mode: false,
            guarded_variable: None,
        }
    }

    pub fn holder(&self) -> Option<ThreadId> {
        self.holder
    }

    pub fn guarded_variable(&self) -> Option<VariableHandle> {
        self.guarded_variable
    }

    pub fn is_held_by_other(&self, thread: ThreadId) -> Option<ThreadId> {
        self.holder.filter(|holder| *holder != thread)
    }

    pub fn acquire(&mut self, thread: ThreadId, write_mode: bool, variable: VariableHandle) {
        self.holder = Some(thread);
        self.write_mode = write_mode;
        self.guarded_variable = Some(variable);
    }

    pub fn release(&mut self) {
        self.holder = None;
        self.write_mode = false;
        self.guarded_variable = None;
    }

    pub fn snapshot(&self) -> LockSnapshot {
        LockSnapshot {
            id: self.id,
            holder: self.holder,
            write_mode: self.write_mode,
            guarded_variable: self.guarded_variable,
        }
    }
}

/// Point-in-time copy of a lock's ownership record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockSnapshot {
    pub id: LockId,
    pub holder: Option<ThreadId>,
    pub write_mode: bool,
    pub guarded_variable: Option<VariableHandle>,
}
