use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::trace;

use crate::{HardwareTimer, InterruptTask};

/// A unit of timed work (a sleep timeout, a wait-with-timeout, ...).
///
/// `on_timer` runs from the timer's fire path with the scheduler lock and the timer lock held. It
/// may wake threads or touch its owner, but must not register or cancel tasks on the same timer.
pub trait TimerTask: Send + Sync {
    fn on_timer(&self);
}

impl<F> TimerTask for F
where
    F: Fn() + Send + Sync,
{
    fn on_timer(&self) {
        self()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerTaskId(u64);

#[derive(Default)]
struct TaskTree {
    next_id: u64,
    /// Keyed by `(time, id)`; ids are allocated in registration order, so ties fire FIFO.
    tasks: BTreeMap<(i64, TimerTaskId), Arc<dyn TimerTask>>,
    times: HashMap<TimerTaskId, i64>,
}

impl TaskTree {
    fn first_time(&self) -> Option<i64> {
        self.tasks.keys().next().map(|&(time, _)| time)
    }
}

/// Time-ordered set of [`TimerTask`]s sharing one [`HardwareTimer`].
///
/// As an [`InterruptTask`] it expires every task that is due and asks to be woken for the earliest
/// remaining one. Tasks are added and cancelled through
/// [`HardwareTimer::register_absolute_task`] and friends so that arming the timer happens under
/// the timer lock.
#[derive(Default)]
pub struct TimerTaskQueue {
    tree: Mutex<TaskTree>,
}

impl TimerTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_tree(&self) -> MutexGuard<'_, TaskTree> {
        self.tree
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn len(&self) -> usize {
        self.lock_tree().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_tree().tasks.is_empty()
    }

    pub fn contains(&self, id: TimerTaskId) -> bool {
        self.lock_tree().times.contains_key(&id)
    }

    /// Time of the earliest pending task.
    pub fn next_task_time(&self) -> Option<i64> {
        self.lock_tree().first_time()
    }

    fn insert(&self, task: Arc<dyn TimerTask>, time: i64) -> TimerTaskId {
        let mut tree = self.lock_tree();
        let id = TimerTaskId(tree.next_id);
        tree.next_id += 1;
        tree.tasks.insert((time, id), task);
        tree.times.insert(id, time);
        id
    }

    fn remove(&self, id: TimerTaskId) -> bool {
        let mut tree = self.lock_tree();
        match tree.times.remove(&id) {
            Some(time) => tree.tasks.remove(&(time, id)).is_some(),
            None => false,
        }
    }
}

impl InterruptTask for TimerTaskQueue {
    fn compute_next_wakeup(&self, current_tick: i64) -> i64 {
        let (expired, next_time) = {
            let mut guard = self.lock_tree();
            let tree = &mut *guard;
            let mut expired = Vec::new();
            while let Some(entry) = tree.tasks.first_entry() {
                if entry.key().0 > current_tick {
                    break;
                }
                let ((_, id), task) = entry.remove_entry();
                tree.times.remove(&id);
                expired.push(task);
            }
            (expired, tree.first_time())
        };

        trace!(
            current_tick,
            expired = expired.len(),
            next_time,
            "expired timer tasks"
        );
        for task in expired {
            task.on_timer();
        }

        next_time.unwrap_or(0)
    }
}

impl fmt::Debug for TimerTaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tree = self.lock_tree();
        f.debug_struct("TimerTaskQueue")
            .field("len", &tree.tasks.len())
            .field("next_task_time", &tree.first_time())
            .finish()
    }
}

impl HardwareTimer<TimerTaskQueue> {
    /// Register `task` to run at absolute tick `time`. The caller holds the scheduler lock.
    ///
    /// The interrupt is re-armed if the task is due before the currently armed deadline.
    pub fn register_absolute_task(&self, task: Arc<dyn TimerTask>, time: i64) -> TimerTaskId {
        let mut timer = self.lock();
        let id = timer.task().insert(task, time);
        if timer.wakeup_time().map_or(true, |armed| time < armed) {
            timer.enable_interrupt(time);
        }
        id
    }

    /// Register `task` to run `delay_ns` after the current tick.
    pub fn register_relative_task(&self, task: Arc<dyn TimerTask>, delay_ns: i64) -> TimerTaskId {
        let time = self.tick().saturating_add(delay_ns);
        self.register_absolute_task(task, time)
    }

    /// Cancel a pending task. Returns `false` if it already ran or was cancelled.
    ///
    /// The interrupt stays armed; if nothing is due when it fires, the timer re-arms for the next
    /// task or disables itself.
    pub fn cancel_task(&self, id: TimerTaskId) -> bool {
        let timer = self.lock();
        timer.task().remove(id)
    }
}
