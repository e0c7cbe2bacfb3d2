/*!
Lock wrappers that report their acquire/release to a [`Detector`].

The real lock is taken before the acquire is reported and the release is
reported before the real lock is dropped, so the detector never sees two
holders of the same lock.

```rust,no_run
use eraser_core::tracked::TrackedMutex;
use eraser_core::{AccessType, Detector, LockId};
use std::sync::Arc;

let detector = Arc::new(Detector::default());
let thread = detector.register_thread(1);
let balance = detector.register_shared_variable("balance");
let mutex = TrackedMutex::new(100, detector.clone(), LockId(1));

let mut guard = mutex.lock(thread, balance).unwrap();
guard.access(AccessType::Write).unwrap();
*guard -= 50;
// Release is reported when the guard drops.
```
*/

use crate::detector::{AccessOutcome, Detector};
use crate::error::DetectorResult;
use crate::event::AccessType;
use crate::lock::LockId;
use crate::thread::ThreadId;
use crate::variable::VariableHandle;
use parking_lot::{Mutex, MutexGuard};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// A `parking_lot::Mutex` whose ownership is mirrored in a detector.
pub struct TrackedMutex<T> {
    inner: Mutex<T>,
    detector: Arc<Detector>,
    lock_id: LockId,
}

impl<T> TrackedMutex<T> {
    pub fn new(data: T, detector: Arc<Detector>, lock_id: LockId) -> Self {
        Self {
            inner: Mutex::new(data),
            detector,
            lock_id,
        }
    }

    pub fn id(&self) -> LockId {
        self.lock_id
    }

    /// Lock in write mode on behalf of `thread`, guarding `variable`.
    pub fn lock(
        &self,
        thread: ThreadId,
        variable: VariableHandle,
    ) -> DetectorResult<TrackedMutexGuard<'_, T>> {
        self.lock_with_mode(thread, variable, true)
    }

    /// Lock, but record the hold as read mode.
    pub fn lock_read(
        &self,
        thread: ThreadId,
        variable: VariableHandle,
    ) -> DetectorResult<TrackedMutexGuard<'_, T>> {
        self.lock_with_mode(thread, variable, false)
    }

    fn lock_with_mode(
        &self,
        thread: ThreadId,
        variable: VariableHandle,
        write_mode: bool,
    ) -> DetectorResult<TrackedMutexGuard<'_, T>> {
        let guard = self.inner.lock();
        // On error the real guard drops here and nothing was recorded.
        self.detector
            .on_lock_acquire(thread, self.lock_id, write_mode, variable)?;
        Ok(TrackedMutexGuard {
            guard,
            detector: &self.detector,
            lock_id: self.lock_id,
            thread,
            variable,
        })
    }
}

/// RAII guard for a tracked mutex. Dropping it reports the release.
pub struct TrackedMutexGuard<'a, T> {
    guard: MutexGuard<'a, T>,
    detector: &'a Detector,
    lock_id: LockId,
    thread: ThreadId,
    variable: VariableHandle,
}

impl<'a, T> TrackedMutexGuard<'a, T> {
    /// Report an access to the guarded variable by the holding thread.
    pub fn access(&self, access: AccessType) -> DetectorResult<AccessOutcome> {
        self.detector
            .on_shared_variable_access(self.thread, self.variable, access)
    }
}

impl<'a, T> Drop for TrackedMutexGuard<'a, T> {
    fn drop(&mut self) {
        if let Err(error) = self
            .detector
            .on_lock_release(self.thread, self.lock_id, self.variable)
        {
            tracing::error!(lock = %self.lock_id, thread = %self.thread, %error, "tracked release rejected");
        }
    }
}

impl<'a, T> Deref for TrackedMutexGuard<'a, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<'a, T> DerefMut for TrackedMutexGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}
