use std::fmt;
use std::sync::Arc;

use aero_core_timing::EventScheduler;

use crate::{InterruptController, NullInterruptController, SchedulerLock};

/// Collaborators shared by kernel objects, injected at construction instead of reached through
/// globals.
#[derive(Clone)]
pub struct KernelContext {
    pub core_timing: Arc<dyn EventScheduler>,
    pub scheduler_lock: Arc<dyn SchedulerLock>,
    pub interrupt_controller: Arc<dyn InterruptController>,
}

impl KernelContext {
    pub fn new(
        core_timing: Arc<dyn EventScheduler>,
        scheduler_lock: Arc<dyn SchedulerLock>,
    ) -> Self {
        Self {
            core_timing,
            scheduler_lock,
            interrupt_controller: Arc::new(NullInterruptController),
        }
    }

    pub fn with_interrupt_controller(
        mut self,
        interrupt_controller: Arc<dyn InterruptController>,
    ) -> Self {
        self.interrupt_controller = interrupt_controller;
        self
    }
}

impl fmt::Debug for KernelContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelContext")
            .field("now_ns", &self.core_timing.global_time_ns())
            .finish_non_exhaustive()
    }
}
