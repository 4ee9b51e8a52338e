/// Work run by a [`HardwareTimer`](crate::HardwareTimer) each time it fires.
///
/// Given the current tick, return the next tick at which the owner wants to be woken, or a
/// non-positive value if no further wakeup is needed. The timer re-arms itself from the returned
/// value; the hook runs with the scheduler lock and the timer's own lock held and must not call
/// `enable_interrupt`/`disable_interrupt` on the same timer.
pub trait InterruptTask: Send + Sync {
    fn compute_next_wakeup(&self, current_tick: i64) -> i64;
}

impl<F> InterruptTask for F
where
    F: Fn(i64) -> i64 + Send + Sync,
{
    fn compute_next_wakeup(&self, current_tick: i64) -> i64 {
        self(current_tick)
    }
}
