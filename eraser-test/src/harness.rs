use eraser_core::config::DetectorConfig;
use eraser_core::event::{EventKind, RaceReport};
use eraser_core::{Detector, DetectorEvent, EventCapture, ThreadId};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;

const CAPTURE_BUFFER: usize = 65_536;

/// A detector wired to an in-memory event capture, plus helpers for
/// driving it from real threads.
pub struct TestSession {
    detector: Arc<Detector>,
    capture: Arc<EventCapture>,
    seen: Mutex<Vec<DetectorEvent>>,
}

impl TestSession {
    pub fn new() -> Self {
        Self::with_config(DetectorConfig::default())
    }

    pub fn with_config(config: DetectorConfig) -> Self {
        let capture = Arc::new(EventCapture::new(CAPTURE_BUFFER));
        let detector = Arc::new(Detector::new(config, capture.clone()));
        detector.start_session();

        Self {
            detector,
            capture,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn detector(&self) -> &Arc<Detector> {
        &self.detector
    }

    /// Every event emitted so far, oldest first.
    pub fn events(&self) -> Vec<DetectorEvent> {
        let mut seen = self.seen.lock();
        seen.extend(self.capture.drain());
        seen.clone()
    }

    pub fn races(&self) -> Vec<RaceReport> {
        self.events()
            .into_iter()
            .filter_map(|event| match event.kind {
                EventKind::RaceDetected(report) => Some(report),
                _ => None,
            })
            .collect()
    }

    pub fn rejections(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event.kind, EventKind::Rejected { .. }))
            .count()
    }

    /// Run `worker` on `count` OS threads, registered as T1..=Tcount, and
    /// unregister each when its worker returns. Results come back in
    /// thread order.
    pub fn run_workers<T, F>(&self, count: usize, worker: F) -> Vec<T>
    where
        T: Send,
        F: Fn(ThreadId, &Detector) -> T + Sync,
    {
        let worker = &worker;
        thread::scope(|scope| {
            let handles: Vec<_> = (1..=count as u64)
                .map(|id| {
                    let detector = Arc::clone(&self.detector);
                    scope.spawn(move || {
                        let thread = detector.register_thread(id);
                        let result = worker(thread, &detector);
                        // A worker may have unregistered itself already.
                        if detector.active_threads().contains(&thread) {
                            detector
                                .unregister_thread(thread)
                                .expect("registered worker unregisters cleanly");
                        }
                        result
                    })
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| handle.join().expect("worker thread panicked"))
                .collect()
        })
    }
}

impl Default for TestSession {
    fn default() -> Self {
        Self::new()
    }
}
