use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use aero_core_timing::EventHandle;
use tracing::trace;

use crate::{InterruptName, InterruptTask, KernelContext, ScopedSchedulerLock};

/// `wakeup_time` value meaning "interrupt disabled".
pub const DISABLED_WAKEUP_TIME: i64 = i64::MAX;

#[derive(Debug)]
struct TimerState {
    wakeup_time: i64,
}

impl TimerState {
    fn interrupt_enabled(&self) -> bool {
        self.wakeup_time != DISABLED_WAKEUP_TIME
    }
}

/// Per-core virtual timer peripheral.
///
/// The timer registers a single event with the global event scheduler at construction and reuses
/// it for every arm/disarm, so at most one fire is ever outstanding. When the event fires, the
/// timer takes the scheduler lock and then its own lock, drops stale fires, disarms, runs its
/// [`InterruptTask`] and re-arms from the tick the task returns.
///
/// `enable_interrupt`/`disable_interrupt` expect the caller to hold the scheduler lock already.
pub struct HardwareTimer<T> {
    kernel: KernelContext,
    core_id: usize,
    event: EventHandle,
    state: Mutex<TimerState>,
    task: T,
}

impl<T: InterruptTask + 'static> HardwareTimer<T> {
    /// Create the timer for `core_id` and register its fire callback. The timer starts disabled.
    pub fn new(kernel: KernelContext, core_id: usize, task: T) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let weak = weak.clone();
            let event = kernel.core_timing.create_event(
                &format!("HardwareTimer::Callback[core{core_id}]"),
                Box::new(move |_now_ns, _late_ns| {
                    // A timer that is being torn down simply drops the fire.
                    if let Some(timer) = weak.upgrade() {
                        timer.do_task();
                    }
                }),
            );

            Self {
                kernel,
                core_id,
                event,
                state: Mutex::new(TimerState {
                    wakeup_time: DISABLED_WAKEUP_TIME,
                }),
                task,
            }
        })
    }

    /// Fire callback. Runs on whichever thread drives the event scheduler.
    pub fn do_task(&self) {
        {
            let scheduler_lock = ScopedSchedulerLock::new(&*self.kernel.scheduler_lock);
            let mut timer = self.lock();

            if !timer.interrupt_enabled() {
                trace!(core = self.core_id, "ignoring stale timer fire");
                return;
            }

            timer.disable_interrupt();

            let now = self.tick();
            let next_time = self.task.compute_next_wakeup(now);
            // Any positive tick re-arms. The deadline that just fired is not used as an upper
            // bound (it has already been reset to the disabled sentinel here).
            if next_time > 0 {
                timer.enable_interrupt(next_time);
            }
            trace!(core = self.core_id, now, next_time, "serviced timer interrupt");

            drop(timer);
            drop(scheduler_lock);
        }

        self.kernel
            .interrupt_controller
            .clear_interrupt(InterruptName::NonSecurePhysicalTimer, self.core_id);
    }
}

impl<T> HardwareTimer<T> {
    fn lock_state(&self) -> MutexGuard<'_, TimerState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Take the timer's own lock for a compound operation.
    ///
    /// Lock order: the scheduler lock must be acquired before this one, never after.
    pub fn lock(&self) -> HardwareTimerGuard<'_, T> {
        HardwareTimerGuard {
            timer: self,
            state: self.lock_state(),
        }
    }

    /// Tear-down counterpart of construction. No new fire can be scheduled after this returns; a
    /// fire that was already being dispatched finds the timer disabled and does nothing.
    pub fn finalize(&self) {
        self.disable_interrupt();
    }

    pub fn enable_interrupt(&self, wakeup_time: i64) {
        self.lock().enable_interrupt(wakeup_time);
    }

    pub fn disable_interrupt(&self) {
        self.lock().disable_interrupt();
    }

    /// Current global tick in nanoseconds.
    pub fn tick(&self) -> i64 {
        self.kernel.core_timing.global_time_ns()
    }

    pub fn interrupt_enabled(&self) -> bool {
        self.lock_state().interrupt_enabled()
    }

    /// Armed deadline, or `None` while disabled.
    pub fn wakeup_time(&self) -> Option<i64> {
        let state = self.lock_state();
        state.interrupt_enabled().then_some(state.wakeup_time)
    }

    pub fn core_id(&self) -> usize {
        self.core_id
    }

    pub fn task(&self) -> &T {
        &self.task
    }

    pub fn kernel(&self) -> &KernelContext {
        &self.kernel
    }
}

impl<T> Drop for HardwareTimer<T> {
    fn drop(&mut self) {
        self.kernel.core_timing.unschedule_event(&self.event);
    }
}

impl<T> fmt::Debug for HardwareTimer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HardwareTimer")
            .field("core_id", &self.core_id)
            .field("event", &self.event)
            .field("wakeup_time", &self.wakeup_time())
            .finish_non_exhaustive()
    }
}

/// The timer's own lock, held.
pub struct HardwareTimerGuard<'a, T> {
    timer: &'a HardwareTimer<T>,
    state: MutexGuard<'a, TimerState>,
}

impl<T> HardwareTimerGuard<'_, T> {
    /// Arm the interrupt for absolute tick `wakeup_time`, replacing any earlier arm.
    ///
    /// Arming for [`DISABLED_WAKEUP_TIME`] leaves the timer disabled.
    pub fn enable_interrupt(&mut self, wakeup_time: i64) {
        self.disable_interrupt();
        if wakeup_time == DISABLED_WAKEUP_TIME {
            return;
        }

        self.state.wakeup_time = wakeup_time;
        self.timer
            .kernel
            .core_timing
            .schedule_event(wakeup_time, &self.timer.event, true);
        trace!(core = self.timer.core_id, wakeup_time, "armed hardware timer");
    }

    pub fn disable_interrupt(&mut self) {
        self.timer
            .kernel
            .core_timing
            .unschedule_event(&self.timer.event);
        self.state.wakeup_time = DISABLED_WAKEUP_TIME;
    }

    pub fn interrupt_enabled(&self) -> bool {
        self.state.interrupt_enabled()
    }

    pub fn wakeup_time(&self) -> Option<i64> {
        self.interrupt_enabled().then_some(self.state.wakeup_time)
    }

    pub fn task(&self) -> &T {
        &self.timer.task
    }
}
