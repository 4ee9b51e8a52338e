use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use tracing::{debug, trace};

use crate::{EventCallback, EventHandle, EventScheduler, EventType, Result, TimingError};

#[derive(Debug)]
struct PendingEvent {
    time_ns: i64,
    /// Insertion order; breaks ties between events due at the same time.
    seq: u64,
    event: EventHandle,
}

impl PartialEq for PendingEvent {
    fn eq(&self, other: &Self) -> bool {
        self.time_ns == other.time_ns && self.seq == other.seq
    }
}

impl Eq for PendingEvent {}

impl PartialOrd for PendingEvent {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingEvent {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Reverse ordering so `BinaryHeap` behaves as a min-heap.
        other
            .time_ns
            .cmp(&self.time_ns)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Debug)]
struct TimingState {
    now_ns: i64,
    next_seq: u64,
    queue: BinaryHeap<PendingEvent>,
    /// Set by `wake_if_idle` schedules until an idle waiter consumes it.
    wake_pending: bool,
}

/// Deterministic virtual clock plus pending-event queue.
///
/// The clock only moves when [`advance_to`](Self::advance_to) / [`advance`](Self::advance) is
/// called. Due callbacks run on the advancing thread with the internal lock released, so a
/// callback may freely schedule or unschedule events (including itself).
///
/// A single driver is expected to advance time; other threads only schedule, unschedule and read
/// the clock.
#[derive(Debug)]
pub struct CoreTiming {
    state: Mutex<TimingState>,
    idle: Condvar,
    next_event_id: AtomicU64,
}

impl CoreTiming {
    pub fn new() -> Self {
        Self::with_start_time(0)
    }

    pub fn with_start_time(start_ns: i64) -> Self {
        Self {
            state: Mutex::new(TimingState {
                now_ns: start_ns,
                next_seq: 0,
                queue: BinaryHeap::new(),
                wake_pending: false,
            }),
            idle: Condvar::new(),
            next_event_id: AtomicU64::new(0),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, TimingState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Schedule `event` to fire `delay_ns` after the current virtual time.
    pub fn schedule_event_after(&self, delay_ns: i64, event: &EventHandle, wake_if_idle: bool) {
        let mut state = self.lock_state();
        let time_ns = state.now_ns.saturating_add(delay_ns);
        self.push_locked(&mut state, time_ns, event, wake_if_idle);
    }

    fn push_locked(
        &self,
        state: &mut TimingState,
        time_ns: i64,
        event: &EventHandle,
        wake_if_idle: bool,
    ) {
        let seq = state.next_seq;
        state.next_seq = state.next_seq.wrapping_add(1);
        state.queue.push(PendingEvent {
            time_ns,
            seq,
            event: Arc::clone(event),
        });
        trace!(event = event.name(), time_ns, wake_if_idle, "scheduled event");

        if wake_if_idle {
            state.wake_pending = true;
            self.idle.notify_all();
        }
    }

    /// Virtual time of the earliest pending event, if any.
    pub fn next_event_ns(&self) -> Option<i64> {
        self.lock_state().queue.peek().map(|pending| pending.time_ns)
    }

    pub fn pending_events(&self) -> usize {
        self.lock_state().queue.len()
    }

    /// Returns whether `event` has at least one pending fire.
    pub fn is_scheduled(&self, event: &EventHandle) -> bool {
        self.lock_state()
            .queue
            .iter()
            .any(|pending| Arc::ptr_eq(&pending.event, event))
    }

    /// Advance the clock to `target_ns`, running every event due at or before it.
    ///
    /// Events run in time order, ties in scheduling order. Before each callback the clock is set
    /// to the event's due time (events that were scheduled in the past run at the current time and
    /// observe a non-zero lateness). Returns the number of callbacks run.
    pub fn advance_to(&self, target_ns: i64) -> Result<usize> {
        {
            let state = self.lock_state();
            if target_ns < state.now_ns {
                return Err(TimingError::TimeWentBackwards {
                    now_ns: state.now_ns,
                    target_ns,
                });
            }
        }

        let mut fired = 0usize;
        loop {
            let mut state = self.lock_state();
            let due = match state.queue.peek() {
                Some(next) if next.time_ns <= target_ns => state.queue.pop(),
                _ => None,
            };
            let Some(pending) = due else {
                state.now_ns = state.now_ns.max(target_ns);
                return Ok(fired);
            };

            state.now_ns = state.now_ns.max(pending.time_ns);
            let now_ns = state.now_ns;
            drop(state);

            let late_ns = now_ns.saturating_sub(pending.time_ns);
            trace!(
                event = pending.event.name(),
                now_ns,
                late_ns,
                "dispatching event"
            );
            pending.event.fire(now_ns, late_ns);
            fired += 1;
        }
    }

    /// Advance the clock by `delta_ns` from the current time.
    pub fn advance(&self, delta_ns: i64) -> Result<usize> {
        let target_ns = self.global_time_ns().saturating_add(delta_ns);
        self.advance_to(target_ns)
    }

    /// Block until a `wake_if_idle` schedule (or [`wake_idle`](Self::wake_idle)) happens, or
    /// `timeout` elapses. Returns `true` if woken; the wake is consumed.
    pub fn wait_for_wake(&self, timeout: Duration) -> bool {
        let state = self.lock_state();
        let (mut state, _) = self
            .idle
            .wait_timeout_while(state, timeout, |state| !state.wake_pending)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::replace(&mut state.wake_pending, false)
    }

    /// Wake any thread blocked in [`wait_for_wake`](Self::wait_for_wake).
    pub fn wake_idle(&self) {
        let mut state = self.lock_state();
        state.wake_pending = true;
        self.idle.notify_all();
    }
}

impl Default for CoreTiming {
    fn default() -> Self {
        Self::new()
    }
}

impl EventScheduler for CoreTiming {
    fn create_event(&self, name: &str, callback: EventCallback) -> EventHandle {
        let id = self.next_event_id.fetch_add(1, Ordering::Relaxed);
        debug!(event = name, id, "registered timing event");
        Arc::new(EventType::new(id, name, callback))
    }

    fn schedule_event(&self, time_ns: i64, event: &EventHandle, wake_if_idle: bool) {
        let mut state = self.lock_state();
        self.push_locked(&mut state, time_ns, event, wake_if_idle);
    }

    fn unschedule_event(&self, event: &EventHandle) {
        let mut state = self.lock_state();
        let before = state.queue.len();
        state
            .queue
            .retain(|pending| !Arc::ptr_eq(&pending.event, event));
        let removed = before - state.queue.len();
        if removed != 0 {
            trace!(event = event.name(), removed, "unscheduled event");
        }
    }

    fn global_time_ns(&self) -> i64 {
        self.lock_state().now_ns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type FireLog = Arc<Mutex<Vec<(String, i64)>>>;

    fn recorder(timing: &CoreTiming, name: &str, log: &FireLog) -> EventHandle {
        let log = Arc::clone(log);
        let tag = name.to_owned();
        timing.create_event(
            name,
            Box::new(move |now, _late| log.lock().unwrap().push((tag.clone(), now))),
        )
    }

    #[test]
    fn events_fire_in_time_then_fifo_order() {
        let timing = CoreTiming::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let a = recorder(&timing, "a", &log);
        let b = recorder(&timing, "b", &log);
        let c = recorder(&timing, "c", &log);

        timing.schedule_event(30, &a, false);
        timing.schedule_event(10, &b, false);
        timing.schedule_event(10, &c, false);

        assert_eq!(timing.advance_to(100).unwrap(), 3);
        assert_eq!(
            *log.lock().unwrap(),
            vec![("b".into(), 10), ("c".into(), 10), ("a".into(), 30)]
        );
        assert_eq!(timing.global_time_ns(), 100);
    }

    #[test]
    fn unschedule_removes_every_pending_fire() {
        let timing = CoreTiming::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let a = recorder(&timing, "a", &log);

        timing.schedule_event(5, &a, false);
        timing.schedule_event(7, &a, false);
        assert!(timing.is_scheduled(&a));
        timing.unschedule_event(&a);
        assert!(!timing.is_scheduled(&a));

        // Unscheduling again is a no-op.
        timing.unschedule_event(&a);
        assert_eq!(timing.advance_to(10).unwrap(), 0);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn advancing_backwards_is_rejected() {
        let timing = CoreTiming::with_start_time(50);
        let err = timing.advance_to(49).unwrap_err();
        assert!(matches!(
            err,
            TimingError::TimeWentBackwards {
                now_ns: 50,
                target_ns: 49
            }
        ));
        assert_eq!(timing.global_time_ns(), 50);
    }

    #[test]
    fn callback_can_reschedule_itself_within_one_advance() {
        let timing = Arc::new(CoreTiming::new());
        let fires = Arc::new(Mutex::new(Vec::new()));
        let slot: Arc<Mutex<Option<EventHandle>>> = Arc::new(Mutex::new(None));

        let event = {
            let rearm = Arc::clone(&timing);
            let fires = Arc::clone(&fires);
            let slot = Arc::clone(&slot);
            timing.create_event(
                "periodic",
                Box::new(move |now, _late| {
                    fires.lock().unwrap().push(now);
                    if let Some(event) = slot.lock().unwrap().as_ref() {
                        rearm.schedule_event(now + 25, event, false);
                    }
                }),
            )
        };
        *slot.lock().unwrap() = Some(Arc::clone(&event));

        timing.schedule_event(25, &event, false);
        assert_eq!(timing.advance_to(100).unwrap(), 4);
        assert_eq!(*fires.lock().unwrap(), vec![25, 50, 75, 100]);
        assert_eq!(timing.next_event_ns(), Some(125));
    }

    #[test]
    fn events_in_the_past_fire_late_at_current_time() {
        let timing = CoreTiming::with_start_time(100);
        let late = Arc::new(Mutex::new(None));
        let event = {
            let late = Arc::clone(&late);
            timing.create_event(
                "late",
                Box::new(move |now, late_ns| *late.lock().unwrap() = Some((now, late_ns))),
            )
        };
        timing.schedule_event(40, &event, false);
        timing.advance(0).unwrap();
        assert_eq!(*late.lock().unwrap(), Some((100, 60)));
    }

    #[test]
    fn relative_schedule_is_based_on_current_time() {
        let timing = CoreTiming::with_start_time(1_000);
        let event = timing.create_event("rel", Box::new(|_, _| {}));
        timing.schedule_event_after(250, &event, false);
        assert_eq!(timing.next_event_ns(), Some(1_250));
    }

    #[test]
    fn wake_if_idle_wakes_a_waiter_once() {
        let timing = CoreTiming::new();
        let event = timing.create_event("wake", Box::new(|_, _| {}));

        assert!(!timing.wait_for_wake(Duration::from_millis(1)));
        timing.schedule_event(10, &event, false);
        assert!(!timing.wait_for_wake(Duration::from_millis(1)));
        timing.schedule_event(10, &event, true);
        assert!(timing.wait_for_wake(Duration::from_millis(1)));
        assert!(!timing.wait_for_wake(Duration::from_millis(1)));
    }
}
