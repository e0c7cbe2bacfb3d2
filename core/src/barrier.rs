use crate::error::{DetectorError, DetectorResult};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};

/// Outcome of a completed barrier wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarrierWaitResult {
    /// Set for exactly one participant per trip: the last one to arrive,
    /// which also ran the trip action.
    pub is_leader: bool,
}

#[derive(Debug, Default)]
struct BarrierState {
    /// `None` until configured, and again once the barrier has tripped.
    capacity: Option<usize>,
    arrived: usize,
    generation: u64,
}

/// Single-use rendezvous for a fixed number of participants.
///
/// The last arriver runs the trip action before anyone is released, so
/// every participant observes its effects on return. There is no timeout:
/// a participant that never arrives blocks the others forever.
#[derive(Debug, Default)]
pub(crate) struct EpochBarrier {
    state: Mutex<BarrierState>,
    released: Condvar,
}

impl EpochBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initialize(&self, count: usize) -> DetectorResult<()> {
        if count == 0 {
            return Err(DetectorError::InvalidBarrierState(
                "participant count must be positive".to_string(),
            ));
        }

        let mut state = self.state.lock();
        if state.arrived > 0 {
            return Err(DetectorError::InvalidBarrierState(format!(
                "{} participant(s) are still waiting",
                state.arrived
            )));
        }
        state.capacity = Some(count);
        Ok(())
    }

    pub fn capacity(&self) -> Option<usize> {
        self.state.lock().capacity
    }

    pub fn wait<F: FnOnce()>(&self, on_trip: F) -> DetectorResult<BarrierWaitResult> {
        let mut state = self.state.lock();
        let capacity = state.capacity.ok_or_else(|| {
            DetectorError::InvalidBarrierState("barrier not initialized".to_string())
        })?;

        state.arrived += 1;
        if state.arrived == capacity {
            on_trip();
            state.arrived = 0;
            state.capacity = None;
            state.generation = state.generation.wrapping_add(1);
            self.released.notify_all();
            return Ok(BarrierWaitResult { is_leader: true });
        }

        let generation = state.generation;
        while state.generation == generation {
            self.released.wait(&mut state);
        }
        Ok(BarrierWaitResult { is_leader: false })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_rejects_zero_participants() {
        let barrier = EpochBarrier::new();
        assert!(matches!(
            barrier.initialize(0),
            Err(DetectorError::InvalidBarrierState(_))
        ));
    }

    #[test]
    fn test_wait_without_initialize() {
        let barrier = EpochBarrier::new();
        assert!(barrier.wait(|| {}).is_err());
    }

    #[test]
    fn test_single_participant_trips_immediately() {
        let barrier = EpochBarrier::new();
        barrier.initialize(1).unwrap();

        let mut tripped = false;
        let result = barrier.wait(|| tripped = true).unwrap();
        assert!(result.is_leader);
        assert!(tripped);

        // Spent until re-initialized.
        assert_eq!(barrier.capacity(), None);
        assert!(barrier.wait(|| {}).is_err());
    }

    #[test]
    fn test_one_leader_and_trip_runs_once() {
        let barrier = Arc::new(EpochBarrier::new());
        barrier.initialize(4).unwrap();
        let trips = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                let trips = Arc::clone(&trips);
                thread::spawn(move || {
                    let result = barrier
                        .wait(|| {
                            trips.fetch_add(1, Ordering::SeqCst);
                        })
                        .unwrap();
                    // The trip action completed before anyone was released.
                    assert_eq!(trips.load(Ordering::SeqCst), 1);
                    result.is_leader
                })
            })
            .collect();

        let leaders = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|leader| *leader)
            .count();
        assert_eq!(leaders, 1);
        assert_eq!(trips.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reinitialize_while_waiting_is_rejected() {
        let barrier = Arc::new(EpochBarrier::new());
        barrier.initialize(2).unwrap();

        let parked = {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || barrier.wait(|| {}).unwrap())
        };
        while barrier.state.lock().arrived == 0 {
            thread::yield_now();
        }

        assert!(matches!(
            barrier.initialize(5),
            Err(DetectorError::InvalidBarrierState(_))
        ));
        assert_eq!(barrier.capacity(), Some(2));

        // The original count still trips the barrier.
        assert!(barrier.wait(|| {}).unwrap().is_leader);
        assert!(!parked.join().unwrap().is_leader);
    }
}
