use crate::lock::LockId;
use crate::thread::ThreadId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type DetectorResult<T> = Result<T, DetectorError>;

/// Errors surfaced by detector operations.
///
/// None of these abort an analysis session. A rejected operation leaves
/// every thread, lock and variable exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum DetectorError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("thread {thread} does not hold lock {lock}")]
    OwnershipViolation { thread: ThreadId, lock: LockId },

    /// Ownership error on acquire: `holder` is the thread that owns `lock`.
    #[error("lock {lock} is already held by thread {holder}")]
    LockHeld { lock: LockId, holder: ThreadId },

    #[error("invalid barrier state: {0}")]
    InvalidBarrierState(String),
}

impl DetectorError {
    pub(crate) fn unknown_thread(thread: ThreadId) -> Self {
        Self::InvalidArgument(format!("thread {} is not registered", thread))
    }

    pub(crate) fn unknown_lock(lock: LockId) -> Self {
        Self::InvalidArgument(format!("lock {} has never been acquired", lock))
    }

    pub(crate) fn unknown_variable(handle: impl std::fmt::Display) -> Self {
        Self::InvalidArgument(format!("variable {} is not registered", handle))
    }

    /// Short machine-friendly name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::OwnershipViolation { .. } => "ownership_violation",
            Self::LockHeld { .. } => "lock_held",
            Self::InvalidBarrierState(_) => "invalid_barrier_state",
        }
    }
}
