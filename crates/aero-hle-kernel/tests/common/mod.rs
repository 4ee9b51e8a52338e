#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use aero_core_timing::CoreTiming;
use aero_hle_kernel::{InterruptController, InterruptName, KSchedulerLock, KernelContext};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

/// Real collaborators wired together the way the machine does it.
pub struct KernelStack {
    pub core_timing: Arc<CoreTiming>,
    pub scheduler_lock: Arc<KSchedulerLock>,
    pub interrupts: Arc<RecordingInterruptController>,
    pub kernel: KernelContext,
}

impl KernelStack {
    pub fn new() -> Self {
        init_tracing();
        let core_timing = Arc::new(CoreTiming::new());
        let scheduler_lock = Arc::new(KSchedulerLock::new());
        let interrupts = Arc::new(RecordingInterruptController::default());
        let kernel = KernelContext::new(core_timing.clone(), scheduler_lock.clone())
            .with_interrupt_controller(interrupts.clone());
        Self {
            core_timing,
            scheduler_lock,
            interrupts,
            kernel,
        }
    }
}

#[derive(Default)]
pub struct RecordingInterruptController {
    cleared: Mutex<Vec<(InterruptName, usize)>>,
    count: AtomicUsize,
}

impl RecordingInterruptController {
    pub fn cleared(&self) -> Vec<(InterruptName, usize)> {
        self.cleared.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl InterruptController for RecordingInterruptController {
    fn clear_interrupt(&self, name: InterruptName, core_id: usize) {
        self.cleared.lock().unwrap().push((name, core_id));
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

/// Interrupt task that records every tick it was invoked with and answers with `next(tick)`.
pub struct RecordingTask<F> {
    pub ticks: Mutex<Vec<i64>>,
    next: F,
}

impl<F> RecordingTask<F>
where
    F: Fn(i64) -> i64 + Send + Sync,
{
    pub fn new(next: F) -> Self {
        Self {
            ticks: Mutex::new(Vec::new()),
            next,
        }
    }

    pub fn ticks(&self) -> Vec<i64> {
        self.ticks.lock().unwrap().clone()
    }
}

impl<F> aero_hle_kernel::InterruptTask for RecordingTask<F>
where
    F: Fn(i64) -> i64 + Send + Sync,
{
    fn compute_next_wakeup(&self, current_tick: i64) -> i64 {
        self.ticks.lock().unwrap().push(current_tick);
        (self.next)(current_tick)
    }
}
