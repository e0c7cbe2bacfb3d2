use crate::barrier::{BarrierWaitResult, EpochBarrier};
use crate::capture::EventCapture;
use crate::config::{Config, DetectorConfig, RelaxationPolicy};
use crate::error::{DetectorError, DetectorResult};
use crate::event::{AccessType, DetectorEvent, EventKind, RaceReport};
use crate::lock::{LockId, LockSnapshot, LockState};
use crate::lockset::{has_common_locks, LocksetView};
use crate::sink::{EventSink, FanoutSink, NullSink, TracingSink};
use crate::thread::{ThreadId, ThreadSnapshot, ThreadState};
use crate::variable::{SharedVariable, State, VariableHandle, VariableSnapshot};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Session counters. Monotonic until the next `start_session`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub accesses: u64,
    pub acquisitions: u64,
    pub releases: u64,
    pub races_detected: u64,
}

/// Aggregate result of an analysis session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub race_ever_detected: bool,
    pub statistics: Statistics,
}

/// Result of reporting one shared-variable access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessOutcome {
    pub race_detected: bool,
    pub report: Option<RaceReport>,
    /// Variable state after the transition.
    pub state: State,
}

#[derive(Default)]
struct Registry {
    threads: HashMap<ThreadId, ThreadState>,
    locks: HashMap<LockId, LockState>,
    variables: Vec<SharedVariable>,
    statistics: Statistics,
    race_detected: bool,
}

impl Registry {
    fn thread(&self, id: ThreadId) -> DetectorResult<&ThreadState> {
        self.threads
            .get(&id)
            .ok_or_else(|| DetectorError::unknown_thread(id))
    }

    fn variable(&self, handle: VariableHandle) -> DetectorResult<&SharedVariable> {
        self.variables
            .get(handle.0)
            .ok_or_else(|| DetectorError::unknown_variable(handle))
    }

    fn variable_mut(&mut self, handle: VariableHandle) -> DetectorResult<&mut SharedVariable> {
        self.variables
            .get_mut(handle.0)
            .ok_or_else(|| DetectorError::unknown_variable(handle))
    }

    /// Whether a thread other than `thread` holds a lock guarding `variable`.
    fn guarded_by_other(&self, variable: VariableHandle, thread: ThreadId) -> bool {
        self.locks.values().any(|lock| {
            lock.guarded_variable() == Some(variable)
                && lock.holder().is_some_and(|holder| holder != thread)
        })
    }
}

/// Eraser lockset detector.
///
/// All bookkeeping lives behind one registry mutex, so every operation is
/// linearized in call order. The barrier has its own lock and never blocks
/// while holding the registry.
pub struct Detector {
    registry: Mutex<Registry>,
    barrier: EpochBarrier,
    sink: Arc<dyn EventSink>,
    capture: Option<Arc<EventCapture>>,
    config: DetectorConfig,
}

impl Default for Detector {
    fn default() -> Self {
        Self::new(DetectorConfig::default(), Arc::new(TracingSink))
    }
}

impl Detector {
    pub fn new(config: DetectorConfig, sink: Arc<dyn EventSink>) -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            barrier: EpochBarrier::new(),
            sink,
            capture: None,
            config,
        }
    }

    /// Build a detector from a full configuration. When events are enabled
    /// they go to the log and to a bounded capture buffer.
    pub fn from_config(config: &Config) -> Self {
        if !config.events.enabled {
            return Self::new(config.detector.clone(), Arc::new(NullSink));
        }

        let capture = Arc::new(EventCapture::new(config.events.buffer_size));
        let sink = FanoutSink::new()
            .with(Arc::new(TracingSink))
            .with(capture.clone());

        let mut detector = Self::new(config.detector.clone(), Arc::new(sink));
        detector.capture = Some(capture);
        detector
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Captured event buffer, if this detector was built with one.
    pub fn capture(&self) -> Option<Arc<EventCapture>> {
        self.capture.clone()
    }

    fn emit(&self, kind: EventKind) {
        self.sink.emit(&DetectorEvent::new(kind));
    }

    fn record<T>(&self, operation: &str, result: DetectorResult<T>) -> DetectorResult<T> {
        if let Err(error) = &result {
            self.emit(EventKind::Rejected {
                operation: operation.to_string(),
                error: error.clone(),
            });
        }
        result
    }

    // Session ---------------------------------------------------------------

    /// Clear every registry and counter for a fresh analysis session.
    /// Handles from the previous session become invalid.
    pub fn start_session(&self) {
        let mut registry = self.registry.lock();
        *registry = Registry::default();
        self.emit(EventKind::SessionStarted);
    }

    /// Report whether any race was observed since the session started.
    pub fn end_session(&self) -> Verdict {
        let registry = self.registry.lock();
        let verdict = Verdict {
            race_ever_detected: registry.race_detected,
            statistics: registry.statistics,
        };
        self.emit(EventKind::SessionEnded { verdict });
        verdict
    }

    pub fn statistics(&self) -> Statistics {
        self.registry.lock().statistics
    }

    pub fn race_detected(&self) -> bool {
        self.registry.lock().race_detected
    }

    // Registration ----------------------------------------------------------

    /// Register a thread. Registering an active id again is a no-op.
    pub fn register_thread(&self, id: impl Into<ThreadId>) -> ThreadId {
        let id = id.into();
        let mut registry = self.registry.lock();
        if !registry.threads.contains_key(&id) {
            registry.threads.insert(id, ThreadState::new(id));
            self.emit(EventKind::ThreadRegistered { thread: id });
        }
        id
    }

    /// Remove a thread from the active set. Locks it still holds are
    /// force-released without relaxing any variable.
    pub fn unregister_thread(&self, id: ThreadId) -> DetectorResult<()> {
        let result = {
            let mut registry = self.registry.lock();
            match registry.threads.remove(&id) {
                Some(thread) => {
                    let mut abandoned = Vec::new();
                    for lock_id in thread.held_locks() {
                        if let Some(lock) = registry.locks.get_mut(&lock_id) {
                            if lock.holder() == Some(id) {
                                lock.release();
                                abandoned.push(lock_id);
                            }
                        }
                    }
                    self.emit(EventKind::ThreadUnregistered {
                        thread: id,
                        abandoned_locks: abandoned,
                    });
                    Ok(())
                }
                None => Err(DetectorError::unknown_thread(id)),
            }
        };
        self.record("unregister_thread", result)
    }

    /// Register a shared variable under `name`.
    ///
    /// Duplicate names produce independent entries unless
    /// `merge_duplicate_variables` is set.
    pub fn register_shared_variable(&self, name: impl Into<String>) -> VariableHandle {
        let name = name.into();
        let mut registry = self.registry.lock();

        if self.config.merge_duplicate_variables {
            if let Some(existing) = registry.variables.iter().position(|v| v.name() == name) {
                let handle = VariableHandle(existing);
                self.emit(EventKind::VariableRegistered {
                    variable: handle,
                    name,
                    merged: true,
                });
                return handle;
            }
        }

        let handle = VariableHandle(registry.variables.len());
        registry
            .variables
            .push(SharedVariable::new(handle, name.clone()));
        self.emit(EventKind::VariableRegistered {
            variable: handle,
            name,
            merged: false,
        });
        handle
    }

    // Lock protocol ---------------------------------------------------------

    pub fn on_lock_acquire(
        &self,
        thread: ThreadId,
        lock: LockId,
        write_mode: bool,
        variable: VariableHandle,
    ) -> DetectorResult<()> {
        let result = self.acquire_locked(thread, lock, write_mode, variable);
        self.record("acquire", result)
    }

    fn acquire_locked(
        &self,
        thread: ThreadId,
        lock: LockId,
        write_mode: bool,
        variable: VariableHandle,
    ) -> DetectorResult<()> {
        let mut registry = self.registry.lock();
        registry.thread(thread)?;
        registry.variable(variable)?;

        if let Some(holder) = registry
            .locks
            .get(&lock)
            .and_then(|state| state.is_held_by_other(thread))
        {
            return Err(DetectorError::LockHeld { lock, holder });
        }

        registry
            .locks
            .entry(lock)
            .or_insert_with(|| LockState::new(lock))
            .acquire(thread, write_mode, variable);

        let write_implies_read = self.config.write_implies_read;
        if let Some(state) = registry.threads.get_mut(&thread) {
            state.acquire(lock, write_mode, write_implies_read);
        }
        registry.statistics.acquisitions += 1;

        self.emit(EventKind::LockAcquired {
            thread,
            lock,
            write_mode,
            variable,
        });
        Ok(())
    }

    pub fn on_lock_release(
        &self,
        thread: ThreadId,
        lock: LockId,
        variable: VariableHandle,
    ) -> DetectorResult<()> {
        let result = self.release_locked(thread, lock, variable);
        self.record("release", result)
    }

    fn release_locked(
        &self,
        thread: ThreadId,
        lock: LockId,
        variable: VariableHandle,
    ) -> DetectorResult<()> {
        let mut registry = self.registry.lock();
        registry.thread(thread)?;
        registry.variable(variable)?;

        // Validate everything before mutating anything.
        let holder = registry
            .locks
            .get(&lock)
            .ok_or_else(|| DetectorError::unknown_lock(lock))?
            .holder();
        if holder != Some(thread) {
            return Err(DetectorError::OwnershipViolation { thread, lock });
        }

        if let Some(state) = registry.locks.get_mut(&lock) {
            state.release();
        }
        if let Some(state) = registry.threads.get_mut(&thread) {
            state.release(lock);
        }

        let relax = match self.config.relaxation {
            RelaxationPolicy::Unconditional => true,
            RelaxationPolicy::WhenUnguarded => !registry.guarded_by_other(variable, thread),
        };
        let var = registry.variable_mut(variable)?;
        var.on_release(thread, relax);
        let state = var.state();
        registry.statistics.releases += 1;

        self.emit(EventKind::LockReleased {
            thread,
            lock,
            variable,
            state,
        });
        Ok(())
    }

    // Accesses --------------------------------------------------------------

    /// Report an access, run the common-lock test and advance the variable's
    /// state. A detected race is returned as data, not as an error.
    pub fn on_shared_variable_access(
        &self,
        thread: ThreadId,
        variable: VariableHandle,
        access: AccessType,
    ) -> DetectorResult<AccessOutcome> {
        let result = self.access_locked(thread, variable, access);
        self.record("access", result)
    }

    fn access_locked(
        &self,
        thread: ThreadId,
        variable: VariableHandle,
        access: AccessType,
    ) -> DetectorResult<AccessOutcome> {
        let mut registry = self.registry.lock();
        let accessor = registry.thread(thread)?;
        let var = registry.variable(variable)?;
        let from = var.state();

        let report = match var.last_accessor() {
            Some(previous) if var.is_accessed() && previous != thread => {
                let empty = BTreeSet::new();
                // An unregistered previous accessor holds nothing.
                let previous_view = registry
                    .threads
                    .get(&previous)
                    .map(|t| LocksetView::new(t.read_locks(), t.write_locks()))
                    .unwrap_or_else(|| LocksetView::new(&empty, &empty));
                let current_view = LocksetView::new(accessor.read_locks(), accessor.write_locks());

                let common = has_common_locks(previous_view, current_view);
                (!common && from.conflicts_with(access)).then(|| RaceReport {
                    thread,
                    conflicting_thread: previous,
                    variable,
                    variable_name: var.name().to_string(),
                    access,
                    state: from,
                    candidate_locks: var.candidate_locks().iter().copied().collect(),
                })
            }
            _ => None,
        };

        let held = accessor.held_locks();
        let refine = self.config.refine_candidate_locks;
        let to = registry
            .variable_mut(variable)?
            .access(thread, access, &held, refine);

        registry.statistics.accesses += 1;
        if let Some(report) = &report {
            registry.statistics.races_detected += 1;
            registry.race_detected = true;
            self.emit(EventKind::RaceDetected(report.clone()));
        }
        self.emit(EventKind::VariableAccessed {
            thread,
            variable,
            access,
            from,
            to,
        });

        Ok(AccessOutcome {
            race_detected: report.is_some(),
            report,
            state: to,
        })
    }

    // Resets and barrier ----------------------------------------------------

    /// Return one variable to `Virgin`, forgetting its accessor and
    /// candidate locks.
    pub fn reset_variable(&self, variable: VariableHandle) -> DetectorResult<()> {
        let result = self
            .registry
            .lock()
            .variable_mut(variable)
            .map(SharedVariable::reset);
        self.record("reset_variable", result)
    }

    /// Mark every registered variable `Clean` so lockset inference starts
    /// over, keeping thread and lock registrations. Returns how many
    /// variables were reset.
    pub fn reset_epoch(&self) -> usize {
        let mut registry = self.registry.lock();
        registry
            .variables
            .iter_mut()
            .for_each(SharedVariable::mark_clean);
        let variables = registry.variables.len();
        self.emit(EventKind::EpochReset { variables });
        variables
    }

    /// Configure the rendezvous for exactly `count` participants.
    pub fn initialize_barrier(&self, count: usize) -> DetectorResult<()> {
        let result = self.barrier.initialize(count);
        self.record("initialize_barrier", result)
    }

    /// Participant count of the armed barrier, `None` when unconfigured or spent.
    pub fn barrier_capacity(&self) -> Option<usize> {
        self.barrier.capacity()
    }

    /// Block until the configured number of participants have arrived. The
    /// last arriver resets every variable to `Clean` before anyone returns.
    pub fn barrier_wait(&self) -> DetectorResult<BarrierWaitResult> {
        let result = self.barrier.wait(|| {
            self.reset_epoch();
        });
        self.record("barrier_wait", result)
    }

    // Introspection ---------------------------------------------------------

    pub fn active_threads(&self) -> Vec<ThreadId> {
        let registry = self.registry.lock();
        let mut threads: Vec<_> = registry.threads.keys().copied().collect();
        threads.sort();
        threads
    }

    pub fn thread_snapshot(&self, id: ThreadId) -> DetectorResult<ThreadSnapshot> {
        self.registry.lock().thread(id).map(ThreadState::snapshot)
    }

    pub fn lock_snapshot(&self, id: LockId) -> DetectorResult<LockSnapshot> {
        self.registry
            .lock()
            .locks
            .get(&id)
            .map(LockState::snapshot)
            .ok_or_else(|| DetectorError::unknown_lock(id))
    }

    pub fn variable_snapshot(&self, handle: VariableHandle) -> DetectorResult<VariableSnapshot> {
        self.registry
            .lock()
            .variable(handle)
            .map(SharedVariable::snapshot)
    }

    pub fn variable_state(&self, handle: VariableHandle) -> DetectorResult<State> {
        self.registry.lock().variable(handle).map(SharedVariable::state)
    }

    /// Every handle registered under `name`, oldest first.
    pub fn variables_named(&self, name: &str) -> Vec<VariableHandle> {
        self.registry
            .lock()
            .variables
            .iter()
            .enumerate()
            .filter(|(_, v)| v.name() == name)
            .map(|(index, _)| VariableHandle(index))
            .collect()
    }

    pub fn variable_count(&self) -> usize {
        self.registry.lock().variables.len()
    }
}
