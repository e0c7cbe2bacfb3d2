pub mod barrier;
pub mod capture;
pub mod config;
pub mod detector;
pub mod error;
pub mod event;
pub mod lock;
pub mod lockset;
pub mod sink;
pub mod thread;
pub mod trace;
pub mod tracked;
pub mod variable;

pub use barrier::BarrierWaitResult;
pub use capture::EventCapture;
pub use config::{Config, DetectorConfig, RelaxationPolicy};
pub use detector::{AccessOutcome, Detector, Statistics, Verdict};
pub use error::{DetectorError, DetectorResult};
pub use event::{AccessType, DetectorEvent, EventKind, RaceReport};
pub use lock::{LockId, LockSnapshot};
pub use sink::{EventSink, FanoutSink, NullSink, TracingSink};
pub use thread::{ThreadId, ThreadSnapshot};
pub use trace::{replay, ReplayOutcome, Trace, TraceStep};
pub use tracked::{TrackedMutex, TrackedMutexGuard};
pub use variable::{State, VariableHandle, VariableSnapshot};
