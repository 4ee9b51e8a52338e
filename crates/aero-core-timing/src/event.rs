use std::fmt;
use std::sync::Arc;

/// Callback run when a scheduled event becomes due.
///
/// Arguments are the virtual time at dispatch and how late (in ns) the dispatch is relative to the
/// requested time. Callbacks run on whichever thread is advancing the clock.
pub type EventCallback = Box<dyn Fn(i64, i64) + Send + Sync>;

/// Shared handle to a registered event; this is the token passed to schedule/unschedule.
pub type EventHandle = Arc<EventType>;

/// A named event registration.
pub struct EventType {
    id: u64,
    name: String,
    callback: EventCallback,
}

impl EventType {
    /// Build a registration record. Schedulers call this from
    /// [`EventScheduler::create_event`]; it is public so test doubles can mint tokens too.
    pub fn new(id: u64, name: &str, callback: EventCallback) -> Self {
        Self {
            id,
            name: name.to_owned(),
            callback,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the callback.
    pub fn fire(&self, now_ns: i64, late_ns: i64) {
        (self.callback)(now_ns, late_ns)
    }
}

impl fmt::Debug for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventType")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// The global event scheduler as seen by kernel code.
///
/// This is the seam kernel objects are written against, so they can be driven by [`CoreTiming`]
/// in production and by a fake in unit tests.
///
/// [`CoreTiming`]: crate::CoreTiming
pub trait EventScheduler: Send + Sync {
    /// Register a callback under a fresh token. Intended to be called once per owner.
    fn create_event(&self, name: &str, callback: EventCallback) -> EventHandle;

    /// Schedule `event` to fire at absolute virtual time `time_ns`.
    ///
    /// An event that is already pending is *not* replaced; callers that want a single outstanding
    /// fire must [`unschedule_event`](Self::unschedule_event) first.
    ///
    /// `wake_if_idle` asks the scheduler to wake an idle driver so the event is not missed while
    /// nothing else is happening.
    fn schedule_event(&self, time_ns: i64, event: &EventHandle, wake_if_idle: bool);

    /// Cancel every pending fire of `event`. No-op if none is pending.
    fn unschedule_event(&self, event: &EventHandle);

    /// Current virtual time in nanoseconds.
    fn global_time_ns(&self) -> i64;
}

impl<T: EventScheduler + ?Sized> EventScheduler for Arc<T> {
    fn create_event(&self, name: &str, callback: EventCallback) -> EventHandle {
        <T as EventScheduler>::create_event(&**self, name, callback)
    }

    fn schedule_event(&self, time_ns: i64, event: &EventHandle, wake_if_idle: bool) {
        <T as EventScheduler>::schedule_event(&**self, time_ns, event, wake_if_idle)
    }

    fn unschedule_event(&self, event: &EventHandle) {
        <T as EventScheduler>::unschedule_event(&**self, event)
    }

    fn global_time_ns(&self) -> i64 {
        <T as EventScheduler>::global_time_ns(&**self)
    }
}
