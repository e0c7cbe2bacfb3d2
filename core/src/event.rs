use crate::detector::Verdict;
use crate::error::DetectorError;
use crate::lock::LockId;
use crate::thread::ThreadId;
use crate::variable::{State, VariableHandle};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Type of shared-variable access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessType {
    Read,
    Write,
}

impl fmt::Display for AccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessType::Read => f.write_str("READ"),
            AccessType::Write => f.write_str("WRITE"),
        }
    }
}

/// Details of a flagged access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceReport {
    /// Thread whose access was flagged.
    pub thread: ThreadId,
    /// Previous accessor the flagged thread shares no lock with.
    pub conflicting_thread: ThreadId,
    pub variable: VariableHandle,
    pub variable_name: String,
    pub access: AccessType,
    /// Variable state at the time of the conflict, before the transition.
    pub state: State,
    /// Candidate lockset at the time of the conflict.
    pub candidate_locks: Vec<LockId>,
}

impl fmt::Display for RaceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "data race on '{}' ({}): {} {} while {} left it {}",
            self.variable_name,
            self.variable,
            self.thread,
            self.access,
            self.conflicting_thread,
            self.state
        )
    }
}

/// One entry of the detector's structured event stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    SessionStarted,
    SessionEnded {
        verdict: Verdict,
    },
    ThreadRegistered {
        thread: ThreadId,
    },
    ThreadUnregistered {
        thread: ThreadId,
        /// Locks force-released because the thread still held them.
        abandoned_locks: Vec<LockId>,
    },
    VariableRegistered {
        variable: VariableHandle,
        name: String,
        merged: bool,
    },
    LockAcquired {
        thread: ThreadId,
        lock: LockId,
        write_mode: bool,
        variable: VariableHandle,
    },
    LockReleased {
        thread: ThreadId,
        lock: LockId,
        variable: VariableHandle,
        state: State,
    },
    VariableAccessed {
        thread: ThreadId,
        variable: VariableHandle,
        access: AccessType,
        from: State,
        to: State,
    },
    RaceDetected(RaceReport),
    EpochReset {
        variables: usize,
    },
    Rejected {
        operation: String,
        error: DetectorError,
    },
}

impl DetectorEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            kind,
        }
    }

    pub fn is_race(&self) -> bool {
        matches!(self.kind, EventKind::RaceDetected(_))
    }
}
