use crate::event::AccessType;
use crate::lock::LockId;
use crate::lockset::intersect;
use crate::thread::ThreadId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Opaque handle to a registered shared variable.
///
/// Handles index the detector's variable arena, so two registrations of
/// the same name yield two distinct handles unless merging is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableHandle(pub usize);

impl fmt::Display for VariableHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Observed sharing pattern of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum State {
    Virgin,
    Initializing,
    Exclusive,
    Shared,
    SharedModified,
    Clean,
    Empty,
}

impl State {
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Virgin => "Virgin",
            State::Initializing => "Initializing",
            State::Exclusive => "Exclusive",
            State::Shared => "Shared",
            State::SharedModified => "SharedModified",
            State::Clean => "Clean",
            State::Empty => "Empty",
        }
    }

    pub fn short(&self) -> &'static str {
        match self {
            State::Virgin => "V",
            State::Initializing => "I",
            State::Exclusive => "E",
            State::Shared => "S",
            State::SharedModified => "SM",
            State::Clean => "C",
            State::Empty => "EM",
        }
    }

    /// Next state after an access of the given type.
    pub fn after_access(self, access: AccessType) -> State {
        use AccessType::*;
        match (self, access) {
            (State::Virgin | State::Clean, Read) => State::Exclusive,
            (State::Virgin | State::Clean, Write) => State::Initializing,
            (State::Initializing | State::Exclusive | State::Shared, Read) => State::Shared,
            (State::Initializing | State::Exclusive | State::Shared, Write) => {
                State::SharedModified
            }
            (State::SharedModified, _) => State::SharedModified,
            (State::Empty, _) => State::Empty,
        }
    }

    /// Next state once a lock guarding the variable is released.
    pub fn after_release(self) -> State {
        match self {
            State::Exclusive => State::Virgin,
            State::SharedModified => State::Shared,
            other => other,
        }
    }

    /// Whether an access of this type, from a thread sharing no lock with the
    /// previous accessor, conflicts with the variable in this state.
    pub fn conflicts_with(self, access: AccessType) -> bool {
        match access {
            AccessType::Write => matches!(
                self,
                State::Exclusive | State::Initializing | State::Shared | State::SharedModified
            ),
            AccessType::Read => matches!(self, State::Exclusive | State::Initializing),
        }
    }

    fn is_fresh(self) -> bool {
        matches!(self, State::Virgin | State::Clean)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-variable protection record.
#[derive(Debug, Clone)]
pub(crate) struct SharedVariable {
    handle: VariableHandle,
    name: String,
    state: State,
    last_accessor: Option<ThreadId>,
    accessed: bool,
    candidate_locks: BTreeSet<LockId>,
}

impl SharedVariable {
    pub fn new(handle: VariableHandle, name: impl Into<String>) -> Self {
        Self {
            handle,
            name: name.into(),
            state: State::Virgin,
            last_accessor: None,
            accessed: false,
            candidate_locks: BTreeSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn last_accessor(&self) -> Option<ThreadId> {
        self.last_accessor
    }

    pub fn is_accessed(&self) -> bool {
        self.accessed
    }

    pub fn candidate_locks(&self) -> &BTreeSet<LockId> {
        &self.candidate_locks
    }

    /// Record an access and advance the state machine.
    ///
    /// `held` is every lock the accessing thread holds; it seeds or narrows
    /// the candidate lockset when `refine` is set.
    pub fn access(
        &mut self,
        thread: ThreadId,
        access: AccessType,
        held: &BTreeSet<LockId>,
        refine: bool,
    ) -> State {
        self.accessed = true;
        self.last_accessor = Some(thread);

        let previous = self.state;
        self.state = previous.after_access(access);

        if refine {
            if previous.is_fresh() {
                self.candidate_locks = held.clone();
            } else if previous != State::Empty {
                self.candidate_locks = intersect(&self.candidate_locks, held);
            }
        }

        self.state
    }

    /// Apply the release relaxation and detach `thread` if it was the last
    /// accessor.
    pub fn on_release(&mut self, thread: ThreadId, relax: bool) {
        if relax {
            self.state = self.state.after_release();
        }
        self.release_thread(thread);
    }

    pub fn release_thread(&mut self, thread: ThreadId) {
        if self.last_accessor == Some(thread) {
            self.accessed = false;
            self.last_accessor = None;
        }
    }

    pub fn reset(&mut self) {
        self.accessed = false;
        self.last_accessor = None;
        self.state = State::Virgin;
        self.candidate_locks.clear();
    }

    /// Start a new epoch: the variable behaves as fresh on its next access.
    /// Thread association is kept.
    pub fn mark_clean(&mut self) {
        self.state = State::Clean;
        self.candidate_locks.clear();
    }

    pub fn snapshot(&self) -> VariableSnapshot {
        VariableSnapshot {
            handle: self.handle,
            name: self.name.clone(),
            state: self.state,
            last_accessor: self.last_accessor,
            accessed: self.accessed,
            candidate_locks: self.candidate_locks.iter().copied().collect(),
        }
    }
}

/// Point-in-time copy of a variable's protection record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableSnapshot {
    pub handle: VariableHandle,
    pub name: String,
    pub state: State,
    pub last_accessor: Option<ThreadId>,
    pub accessed: bool,
    pub candidate_locks: Vec<LockId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locks(ids: &[u64]) -> BTreeSet<LockId> {
        ids.iter().copied().map(LockId).collect()
    }

    #[test]
    fn test_transition_table() {
        use AccessType::*;
        let cases = [
            (State::Virgin, Read, State::Exclusive),
            (State::Virgin, Write, State::Initializing),
            (State::Initializing, Read, State::Shared),
            (State::Initializing, Write, State::SharedModified),
            (State::Exclusive, Read, State::Shared),
            (State::Exclusive, Write, State::SharedModified),
            (State::Shared, Read, State::Shared),
            (State::Shared, Write, State::SharedModified),
            (State::SharedModified, Read, State::SharedModified),
            (State::SharedModified, Write, State::SharedModified),
            (State::Clean, Read, State::Exclusive),
            (State::Clean, Write, State::Initializing),
            (State::Empty, Read, State::Empty),
            (State::Empty, Write, State::Empty),
        ];

        for (from, access, to) in cases {
            assert_eq!(from.after_access(access), to, "{} + {:?}", from, access);
        }
    }

    #[test]
    fn test_release_relaxation() {
        assert_eq!(State::Exclusive.after_release(), State::Virgin);
        assert_eq!(State::SharedModified.after_release(), State::Shared);
        assert_eq!(State::Initializing.after_release(), State::Initializing);
        assert_eq!(State::Shared.after_release(), State::Shared);
        assert_eq!(State::Clean.after_release(), State::Clean);
    }

    #[test]
    fn test_read_conflicts_only_with_exclusive_writers() {
        assert!(State::Exclusive.conflicts_with(AccessType::Read));
        assert!(State::Initializing.conflicts_with(AccessType::Read));
        assert!(!State::Shared.conflicts_with(AccessType::Read));
        assert!(!State::SharedModified.conflicts_with(AccessType::Read));

        assert!(State::Shared.conflicts_with(AccessType::Write));
        assert!(State::SharedModified.conflicts_with(AccessType::Write));
        assert!(!State::Virgin.conflicts_with(AccessType::Write));
        assert!(!State::Clean.conflicts_with(AccessType::Write));
        assert!(!State::Empty.conflicts_with(AccessType::Write));
    }

    #[test]
    fn test_access_records_accessor_even_when_empty() {
        let mut var = SharedVariable::new(VariableHandle(0), "x");
        var.state = State::Empty;

        let state = var.access(ThreadId(5), AccessType::Write, &locks(&[]), true);
        assert_eq!(state, State::Empty);
        assert!(var.is_accessed());
        assert_eq!(var.last_accessor(), Some(ThreadId(5)));
    }

    #[test]
    fn test_candidate_locks_seed_and_narrow() {
        let mut var = SharedVariable::new(VariableHandle(0), "balance");

        var.access(ThreadId(1), AccessType::Write, &locks(&[1, 2]), true);
        assert_eq!(var.candidate_locks(), &locks(&[1, 2]));

        var.access(ThreadId(2), AccessType::Write, &locks(&[2, 3]), true);
        assert_eq!(var.candidate_locks(), &locks(&[2]));

        var.access(ThreadId(1), AccessType::Read, &locks(&[]), true);
        assert!(var.candidate_locks().is_empty());
    }

    #[test]
    fn test_candidate_refinement_disabled() {
        let mut var = SharedVariable::new(VariableHandle(0), "balance");
        var.access(ThreadId(1), AccessType::Write, &locks(&[1]), false);
        assert!(var.candidate_locks().is_empty());
    }

    #[test]
    fn test_release_detaches_only_last_accessor() {
        let mut var = SharedVariable::new(VariableHandle(0), "x");
        var.access(ThreadId(1), AccessType::Read, &locks(&[]), true);
        assert_eq!(var.state(), State::Exclusive);

        var.on_release(ThreadId(2), true);
        assert_eq!(var.state(), State::Virgin);
        assert_eq!(var.last_accessor(), Some(ThreadId(1)));

        var.on_release(ThreadId(1), true);
        assert!(!var.is_accessed());
        assert_eq!(var.last_accessor(), None);
    }

    #[test]
    fn test_reset_and_mark_clean() {
        let mut var = SharedVariable::new(VariableHandle(0), "x");
        var.access(ThreadId(1), AccessType::Write, &locks(&[1]), true);

        var.mark_clean();
        assert_eq!(var.state(), State::Clean);
        assert_eq!(var.last_accessor(), Some(ThreadId(1)));
        assert!(var.candidate_locks().is_empty());

        var.reset();
        let snapshot = var.snapshot();
        assert_eq!(snapshot.state, State::Virgin);
        assert!(!snapshot.accessed);
        assert_eq!(snapshot.last_accessor, None);
    }

    #[test]
    fn test_state_names() {
        assert_eq!(State::SharedModified.as_str(), "SharedModified");
        assert_eq!(State::SharedModified.short(), "SM");
        assert_eq!(State::Empty.short(), "EM");
        assert_eq!(State::Clean.to_string(), "Clean");
    }
}
