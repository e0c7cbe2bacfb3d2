use crate::event::DetectorEvent;
use crate::sink::EventSink;
use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};

/// Bounded, lock-free buffer of detector events.
///
/// Emission never blocks the detector: once the buffer is full, new events
/// are dropped and counted.
pub struct EventCapture {
    sender: Sender<DetectorEvent>,
    receiver: Receiver<DetectorEvent>,
    dropped: AtomicU64,
}

impl EventCapture {
    pub fn new(buffer_size: usize) -> Self {
        let (sender, receiver) = bounded(buffer_size);
        Self {
            sender,
            receiver,
            dropped: AtomicU64::new(0),
        }
    }

    /// Get the receiver for consuming events on another thread
    pub fn get_receiver(&self) -> Receiver<DetectorEvent> {
        self.receiver.clone()
    }

    /// Drain all pending events
    pub fn drain(&self) -> Vec<DetectorEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }

    /// Number of events lost to a full buffer
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl EventSink for EventCapture {
    fn emit(&self, event: &DetectorEvent) {
        if let Err(TrySendError::Full(_)) = self.sender.try_send(event.clone()) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}
