use eraser_core::trace::{Trace, TraceStep};
use eraser_core::{AccessType, LockId, ThreadId};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct TraceFixture {
    pub name: &'static str,
    pub trace: Trace,
    pub expected_races: usize,
    pub expected_rejections: usize,
}

fn register_threads(ids: &[u64]) -> Vec<TraceStep> {
    ids.iter()
        .map(|id| TraceStep::RegisterThread {
            thread: ThreadId(*id),
        })
        .collect()
}

fn variable(name: &str) -> TraceStep {
    TraceStep::RegisterVariable { name: name.into() }
}

fn access(thread: u64, name: &str, access: AccessType) -> TraceStep {
    TraceStep::Access {
        thread: ThreadId(thread),
        variable: name.into(),
        access,
    }
}

fn acquire(thread: u64, lock: u64, write: bool, name: &str) -> TraceStep {
    TraceStep::Acquire {
        thread: ThreadId(thread),
        lock: LockId(lock),
        write,
        variable: name.into(),
    }
}

fn release(thread: u64, lock: u64, name: &str) -> TraceStep {
    TraceStep::Release {
        thread: ThreadId(thread),
        lock: LockId(lock),
        variable: name.into(),
    }
}

/// Two threads write `var1` with no locks held.
pub fn unlocked_write_write() -> TraceFixture {
    let mut steps = register_threads(&[1, 2]);
    steps.push(variable("var1"));
    steps.push(access(1, "var1", AccessType::Write));
    steps.push(access(2, "var1", AccessType::Write));

    TraceFixture {
        name: "unlocked_write_write",
        trace: Trace::new(steps),
        expected_races: 1,
        expected_rejections: 0,
    }
}

/// Two unlocked reads: the second hits an Exclusive variable and is flagged.
pub fn unlocked_read_read() -> TraceFixture {
    let mut steps = register_threads(&[1, 2]);
    steps.push(variable("var1"));
    steps.push(access(1, "var1", AccessType::Read));
    steps.push(access(2, "var1", AccessType::Read));

    TraceFixture {
        name: "unlocked_read_read",
        trace: Trace::new(steps),
        expected_races: 1,
        expected_rejections: 0,
    }
}

/// Crossed read/write on two variables, no locks.
pub fn mixed_access() -> TraceFixture {
    let mut steps = register_threads(&[1, 2]);
    steps.push(variable("var1"));
    steps.push(variable("var2"));
    steps.push(access(1, "var1", AccessType::Read));
    steps.push(access(1, "var2", AccessType::Write));
    steps.push(access(2, "var1", AccessType::Write));
    steps.push(access(2, "var2", AccessType::Read));

    TraceFixture {
        name: "mixed_access",
        trace: Trace::new(steps),
        expected_races: 2,
        expected_rejections: 0,
    }
}

/// Both threads write under the same write-mode lock, one after the other.
pub fn protected_writes() -> TraceFixture {
    let mut steps = register_threads(&[1, 2]);
    steps.push(variable("var1"));
    for thread in [1, 2, 1, 2] {
        steps.push(acquire(thread, 1, true, "var1"));
        steps.push(access(thread, "var1", AccessType::Write));
        steps.push(release(thread, 1, "var1"));
    }

    TraceFixture {
        name: "protected_writes",
        trace: Trace::new(steps),
        expected_races: 0,
        expected_rejections: 0,
    }
}

/// Nested acquisition of two locks, released in reverse order.
pub fn nested_locks() -> TraceFixture {
    let mut steps = register_threads(&[1, 2]);
    steps.push(variable("var1"));
    for thread in [1, 2] {
        steps.push(acquire(thread, 1, true, "var1"));
        steps.push(acquire(thread, 2, true, "var1"));
        steps.push(access(thread, "var1", AccessType::Write));
        steps.push(release(thread, 2, "var1"));
        steps.push(release(thread, 1, "var1"));
    }

    TraceFixture {
        name: "nested_locks",
        trace: Trace::new(steps),
        expected_races: 0,
        expected_rejections: 0,
    }
}

/// Each thread holds its own lock while writing: disjoint locksets.
pub fn disjoint_locks() -> TraceFixture {
    let mut steps = register_threads(&[1, 2]);
    steps.push(variable("var1"));
    steps.push(acquire(1, 1, true, "var1"));
    steps.push(access(1, "var1", AccessType::Write));
    steps.push(acquire(2, 2, true, "var1"));
    steps.push(access(2, "var1", AccessType::Write));
    steps.push(release(1, 1, "var1"));
    steps.push(release(2, 2, "var1"));

    TraceFixture {
        name: "disjoint_locks",
        trace: Trace::new(steps),
        expected_races: 1,
        expected_rejections: 0,
    }
}

/// A barrier between two phases makes the second writer look fresh.
pub fn epoch_separated_writes() -> TraceFixture {
    let mut steps = register_threads(&[1, 2]);
    steps.push(variable("var1"));
    steps.push(access(1, "var1", AccessType::Write));
    steps.push(TraceStep::Epoch);
    steps.push(access(2, "var1", AccessType::Write));

    TraceFixture {
        name: "epoch_separated_writes",
        trace: Trace::new(steps),
        expected_races: 0,
        expected_rejections: 0,
    }
}

/// Ownership mistakes: stealing a held lock and releasing twice.
pub fn ownership_errors() -> TraceFixture {
    let mut steps = register_threads(&[1, 2]);
    steps.push(variable("var1"));
    steps.push(acquire(1, 1, true, "var1"));
    steps.push(acquire(2, 1, true, "var1"));
    steps.push(release(2, 1, "var1"));
    steps.push(release(1, 1, "var1"));
    steps.push(release(1, 1, "var1"));

    TraceFixture {
        name: "ownership_errors",
        trace: Trace::new(steps),
        expected_races: 0,
        expected_rejections: 3,
    }
}

pub fn all_fixtures() -> Vec<TraceFixture> {
    vec![
        unlocked_write_write(),
        unlocked_read_read(),
        mixed_access(),
        protected_writes(),
        nested_locks(),
        disjoint_locks(),
        epoch_separated_writes(),
        ownership_errors(),
    ]
}
