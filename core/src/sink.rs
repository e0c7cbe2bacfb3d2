//! Pluggable destinations for the detector's event stream.

use crate::event::{DetectorEvent, EventKind};
use std::sync::Arc;

/// Receives every event the detector produces.
///
/// Sinks are called while the detector's registry lock is held, so they
/// must not call back into the detector.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &DetectorEvent);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &DetectorEvent) {}
}

/// Forwards events to the `tracing` facade as structured log records.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &DetectorEvent) {
        match &event.kind {
            EventKind::SessionStarted => tracing::info!("data race detector initialized"),
            EventKind::SessionEnded { verdict } => {
                if verdict.race_ever_detected {
                    tracing::warn!(
                        races = verdict.statistics.races_detected,
                        "session finished: data race detected"
                    );
                } else {
                    tracing::info!("session finished: no data race detected");
                }
            }
            EventKind::ThreadRegistered { thread } => {
                tracing::debug!(%thread, "thread registered");
            }
            EventKind::ThreadUnregistered {
                thread,
                abandoned_locks,
            } => {
                if abandoned_locks.is_empty() {
                    tracing::debug!(%thread, "thread unregistered");
                } else {
                    tracing::warn!(
                        %thread,
                        ?abandoned_locks,
                        "thread unregistered while holding locks"
                    );
                }
            }
            EventKind::VariableRegistered {
                variable,
                name,
                merged,
            } => {
                tracing::debug!(%variable, name = %name, merged, "shared variable registered");
            }
            EventKind::LockAcquired {
                thread,
                lock,
                write_mode,
                variable,
            } => {
                tracing::debug!(%thread, %lock, write_mode, %variable, "lock acquired");
            }
            EventKind::LockReleased {
                thread,
                lock,
                variable,
                state,
            } => {
                tracing::debug!(%thread, %lock, %variable, %state, "lock released");
            }
            EventKind::VariableAccessed {
                thread,
                variable,
                access,
                from,
                to,
            } => {
                tracing::trace!(%thread, %variable, %access, %from, %to, "variable accessed");
            }
            EventKind::RaceDetected(report) => {
                tracing::warn!(
                    thread = %report.thread,
                    conflicting_thread = %report.conflicting_thread,
                    variable = %report.variable_name,
                    access = %report.access,
                    state = %report.state,
                    "potential data race"
                );
            }
            EventKind::EpochReset { variables } => {
                tracing::info!(variables, "barrier reached, variables reset to Clean");
            }
            EventKind::Rejected { operation, error } => {
                tracing::error!(
                    operation = %operation,
                    kind = error.kind(),
                    error = %error,
                    "operation rejected"
                );
            }
        }
    }
}

/// Delivers each event to several sinks in order.
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventSink for FanoutSink {
    fn emit(&self, event: &DetectorEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}
