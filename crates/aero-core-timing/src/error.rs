use thiserror::Error;

pub type Result<T> = std::result::Result<T, TimingError>;

/// Errors reported by the timing subsystem.
///
/// Event scheduling itself is infallible; only driving the clock and spawning the host timing
/// thread can fail.
#[derive(Debug, Error)]
pub enum TimingError {
    #[error("virtual time cannot move backwards: now={now_ns} target={target_ns}")]
    TimeWentBackwards { now_ns: i64, target_ns: i64 },

    #[error("invalid timing configuration: {0}")]
    InvalidConfig(&'static str),

    #[error("failed to spawn timing thread: {0}")]
    Spawn(#[from] std::io::Error),
}
