//! Recorded event traces and their replay through a [`Detector`].

use crate::detector::{Detector, Statistics, Verdict};
use crate::error::DetectorError;
use crate::event::{AccessType, RaceReport};
use crate::lock::LockId;
use crate::thread::ThreadId;
use crate::variable::VariableHandle;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// One reported event. Variables are referenced by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TraceStep {
    RegisterThread {
        thread: ThreadId,
    },
    UnregisterThread {
        thread: ThreadId,
    },
    RegisterVariable {
        name: String,
    },
    Acquire {
        thread: ThreadId,
        lock: LockId,
        #[serde(default)]
        write: bool,
        variable: String,
    },
    Release {
        thread: ThreadId,
        lock: LockId,
        variable: String,
    },
    Access {
        thread: ThreadId,
        variable: String,
        access: AccessType,
    },
    /// All participants met at a barrier.
    Epoch,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace {
    pub steps: Vec<TraceStep>,
}

impl Trace {
    pub fn new(steps: Vec<TraceStep>) -> Self {
        Self { steps }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read trace file {:?}", path.as_ref()))?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse trace")
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize trace")
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Names referenced before any `register_variable` for them.
    pub fn unresolved_variables(&self) -> Vec<(usize, String)> {
        let mut known = HashSet::new();
        let mut unresolved = Vec::new();
        for (index, step) in self.steps.iter().enumerate() {
            match step {
                TraceStep::RegisterVariable { name } => {
                    known.insert(name.as_str());
                }
                TraceStep::Acquire { variable, .. }
                | TraceStep::Release { variable, .. }
                | TraceStep::Access { variable, .. } => {
                    if !known.contains(variable.as_str()) {
                        unresolved.push((index, variable.clone()));
                    }
                }
                _ => {}
            }
        }
        unresolved
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayedRace {
    pub step: usize,
    pub report: RaceReport,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedStep {
    pub step: usize,
    pub error: DetectorError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayOutcome {
    pub steps: usize,
    pub races: Vec<ReplayedRace>,
    pub rejected: Vec<RejectedStep>,
    pub statistics: Statistics,
    pub verdict: Verdict,
}

/// Run every step of `trace` through `detector` in a fresh session.
///
/// Rejected steps are collected and the replay carries on.
pub fn replay(detector: &Detector, trace: &Trace) -> ReplayOutcome {
    detector.start_session();

    let mut names: HashMap<&str, VariableHandle> = HashMap::new();
    let mut races = Vec::new();
    let mut rejected = Vec::new();

    for (index, step) in trace.steps.iter().enumerate() {
        let resolve = |names: &HashMap<&str, VariableHandle>, name: &str| {
            names.get(name).copied().ok_or_else(|| {
                DetectorError::InvalidArgument(format!("variable '{}' is not registered", name))
            })
        };

        let result = match step {
            TraceStep::RegisterThread { thread } => {
                detector.register_thread(*thread);
                Ok(())
            }
            TraceStep::UnregisterThread { thread } => detector.unregister_thread(*thread),
            TraceStep::RegisterVariable { name } => {
                let handle = detector.register_shared_variable(name.as_str());
                names.insert(name.as_str(), handle);
                Ok(())
            }
            TraceStep::Acquire {
                thread,
                lock,
                write,
                variable,
            } => resolve(&names, variable)
                .and_then(|handle| detector.on_lock_acquire(*thread, *lock, *write, handle)),
            TraceStep::Release {
                thread,
                lock,
                variable,
            } => resolve(&names, variable)
                .and_then(|handle| detector.on_lock_release(*thread, *lock, handle)),
            TraceStep::Access {
                thread,
                variable,
                access,
            } => resolve(&names, variable)
                .and_then(|handle| detector.on_shared_variable_access(*thread, handle, *access))
                .map(|outcome| {
                    if let Some(report) = outcome.report {
                        races.push(ReplayedRace {
                            step: index,
                            report,
                        });
                    }
                }),
            TraceStep::Epoch => {
                detector.reset_epoch();
                Ok(())
            }
        };

        if let Err(error) = result {
            tracing::debug!(step = index, error = %error, "trace step rejected");
            rejected.push(RejectedStep { step: index, error });
        }
    }

    let verdict = detector.end_session();
    ReplayOutcome {
        steps: trace.len(),
        races,
        rejected,
        statistics: verdict.statistics,
        verdict,
    }
}
