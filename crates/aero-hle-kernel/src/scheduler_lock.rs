use std::sync::{Condvar, Mutex, MutexGuard};
use std::thread::{self, ThreadId};

/// Kernel-wide lock serializing scheduling decisions across emulated cores.
///
/// Implementations must be reentrant with respect to the calling host thread.
pub trait SchedulerLock: Send + Sync {
    fn lock(&self);
    fn unlock(&self);
    fn is_locked_by_current_thread(&self) -> bool;
}

/// RAII guard: acquires a [`SchedulerLock`] on construction and releases it on drop.
#[must_use = "the scheduler lock is released as soon as the guard is dropped"]
pub struct ScopedSchedulerLock<'a> {
    lock: &'a dyn SchedulerLock,
}

impl<'a> ScopedSchedulerLock<'a> {
    pub fn new(lock: &'a dyn SchedulerLock) -> Self {
        lock.lock();
        Self { lock }
    }
}

impl Drop for ScopedSchedulerLock<'_> {
    fn drop(&mut self) {
        self.lock.unlock();
    }
}

#[derive(Debug, Default)]
struct LockState {
    owner: Option<ThreadId>,
    depth: u32,
}

/// Reentrant scheduler lock keyed on the host thread.
#[derive(Debug, Default)]
pub struct KSchedulerLock {
    state: Mutex<LockState>,
    released: Condvar,
}

impl KSchedulerLock {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_state(&self) -> MutexGuard<'_, LockState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_locked(&self) -> bool {
        self.lock_state().owner.is_some()
    }

    /// Recursion depth held by the current thread (zero if it does not own the lock).
    pub fn depth(&self) -> u32 {
        let state = self.lock_state();
        if state.owner == Some(thread::current().id()) {
            state.depth
        } else {
            0
        }
    }
}

impl SchedulerLock for KSchedulerLock {
    fn lock(&self) {
        let me = thread::current().id();
        let mut state = self.lock_state();
        if state.owner == Some(me) {
            state.depth += 1;
            return;
        }
        while state.owner.is_some() {
            state = self
                .released
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        state.owner = Some(me);
        state.depth = 1;
    }

    fn unlock(&self) {
        let me = thread::current().id();
        let mut state = self.lock_state();
        debug_assert_eq!(
            state.owner,
            Some(me),
            "scheduler lock released by a thread that does not hold it"
        );
        if state.owner != Some(me) {
            return;
        }
        state.depth -= 1;
        if state.depth == 0 {
            state.owner = None;
            self.released.notify_one();
        }
    }

    fn is_locked_by_current_thread(&self) -> bool {
        self.lock_state().owner == Some(thread::current().id())
    }
}
