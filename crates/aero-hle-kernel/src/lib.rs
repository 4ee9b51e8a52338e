//! HLE kernel timing primitives.
//!
//! Each emulated core owns a [`HardwareTimer`]: a virtual version of the per-core timer peripheral
//! that raises an interrupt at a programmed absolute tick. The timer sits on top of the global
//! [`EventScheduler`](aero_core_timing::EventScheduler) and reconciles its fire callback with the
//! kernel's scheduling decisions using a fixed lock order:
//!
//! 1. the kernel-wide [`SchedulerLock`] (outer);
//! 2. the timer's own lock (inner);
//! 3. any lock owned by the timer's [`InterruptTask`] (e.g. the [`TimerTaskQueue`]).
//!
//! Locks are released in reverse order. Code that already holds the scheduler lock must never take
//! a second timer's lock out of this order.
#![forbid(unsafe_code)]

mod hardware_timer;
mod interrupt;
mod interrupt_task;
mod kernel;
mod scheduler_lock;
mod timer_task;

pub use hardware_timer::{HardwareTimer, HardwareTimerGuard, DISABLED_WAKEUP_TIME};
pub use interrupt::{InterruptController, InterruptName, NullInterruptController};
pub use interrupt_task::InterruptTask;
pub use kernel::KernelContext;
pub use scheduler_lock::{KSchedulerLock, SchedulerLock, ScopedSchedulerLock};
pub use timer_task::{TimerTask, TimerTaskId, TimerTaskQueue};
