use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use crate::{CoreTiming, EventScheduler, Result, TimingConfig};

const MIN_IDLE_WAIT: Duration = Duration::from_millis(1);

/// Host thread that drives a [`CoreTiming`] clock forward.
///
/// Event callbacks run on this thread, which is a different execution context from any kernel
/// code that schedules them. The thread is stopped and joined on [`stop`](Self::stop) or drop.
#[derive(Debug)]
pub struct TimingThread {
    core_timing: Arc<CoreTiming>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl TimingThread {
    pub fn spawn(core_timing: Arc<CoreTiming>, config: TimingConfig) -> Result<Self> {
        config.validate()?;
        debug!(
            step_ns = config.step_ns,
            host_pause_us = config.host_pause.as_micros() as u64,
            skip_idle = config.skip_idle,
            "starting timing thread"
        );

        let stop = Arc::new(AtomicBool::new(false));
        let handle = thread::Builder::new()
            .name("aero-core-timing".into())
            .spawn({
                let core_timing = Arc::clone(&core_timing);
                let stop = Arc::clone(&stop);
                move || run(&core_timing, &config, &stop)
            })?;

        Ok(Self {
            core_timing,
            stop,
            handle: Some(handle),
        })
    }

    pub fn core_timing(&self) -> &Arc<CoreTiming> {
        &self.core_timing
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the thread and wait for it to exit. Virtual time stays where the thread left it.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        self.stop.store(true, Ordering::Release);
        self.core_timing.wake_idle();
        if handle.join().is_err() {
            warn!("timing thread panicked");
        }
        debug!(
            now_ns = self.core_timing.global_time_ns(),
            "timing thread stopped"
        );
    }
}

impl Drop for TimingThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(core_timing: &CoreTiming, config: &TimingConfig, stop: &AtomicBool) {
    let idle_wait = config.host_pause.max(MIN_IDLE_WAIT);

    while !stop.load(Ordering::Acquire) {
        if config.skip_idle && core_timing.next_event_ns().is_none() {
            core_timing.wait_for_wake(idle_wait);
            continue;
        }

        if let Err(err) = core_timing.advance(config.step_ns) {
            warn!(%err, "timing thread failed to advance virtual time");
        }

        if !config.host_pause.is_zero() {
            thread::sleep(config.host_pause);
        }
    }
}
