use std::time::Duration;

use crate::{Result, TimingError};

/// Configuration for a host-driven [`TimingThread`](crate::TimingThread).
#[derive(Debug, Clone)]
pub struct TimingConfig {
    /// Virtual nanoseconds the clock advances per driver step.
    pub step_ns: i64,
    /// Host time to pause between steps. Zero runs the clock as fast as the host allows.
    pub host_pause: Duration,
    /// When nothing is pending, park until an event is scheduled with `wake_if_idle` instead of
    /// letting virtual time run on.
    pub skip_idle: bool,
}

impl TimingConfig {
    pub const DEFAULT_STEP_NS: i64 = 1_000_000;

    pub fn new(step_ns: i64) -> Self {
        Self {
            step_ns,
            host_pause: Duration::from_millis(1),
            skip_idle: true,
        }
    }

    pub fn host_pause(mut self, pause: Duration) -> Self {
        self.host_pause = pause;
        self
    }

    pub fn skip_idle(mut self, skip_idle: bool) -> Self {
        self.skip_idle = skip_idle;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.step_ns <= 0 {
            return Err(TimingError::InvalidConfig("step_ns must be positive"));
        }
        Ok(())
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_STEP_NS)
    }
}
