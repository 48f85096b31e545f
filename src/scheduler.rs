//! Host event-loop seams: periodic scheduling and the local wall clock.
//!
//! ARCHITECTURE
//! ============
//! The engine only ever talks to [`Scheduler`] and [`LocalClock`]. In the
//! browser these are backed by `setInterval`/`setTimeout` and `Date.now()`
//! (see `web`); everywhere else [`ManualScheduler`] provides a virtual clock
//! that advances only when told to, which keeps tick ordering deterministic.
//!
//! All callbacks run on one thread. A callback may cancel its own task or
//! schedule new ones while it runs.

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod scheduler_test;

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use time::UtcOffset;

/// Handle of a scheduled task, unique per scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub u64);

pub trait Scheduler {
    /// Run `callback` every `period_ms` until cancelled. The first run happens
    /// one period from now.
    fn set_interval(&self, period_ms: u32, callback: Box<dyn FnMut()>) -> TaskId;

    /// Run `callback` once after `delay_ms` unless cancelled first.
    fn set_timeout(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> TaskId;

    /// Cancel a task. Unknown or already-finished ids are ignored.
    fn cancel(&self, task: TaskId);
}

pub trait LocalClock {
    /// Local wall-clock milliseconds since the Unix epoch.
    fn now_ms(&self) -> i64;

    /// Offset used to present instants in the viewer's local time.
    fn utc_offset(&self) -> UtcOffset {
        UtcOffset::UTC
    }
}

enum ManualCallback {
    Once(Box<dyn FnOnce()>),
    Repeat(Box<dyn FnMut()>),
}

struct ManualTask {
    due_ms: u64,
    period_ms: Option<u64>,
    /// Taken out while the callback runs so re-entrant calls can borrow the table.
    callback: Option<ManualCallback>,
}

struct ManualState {
    epoch_ms: i64,
    elapsed_ms: Cell<u64>,
    utc_offset: Cell<UtcOffset>,
    next_id: Cell<u64>,
    tasks: RefCell<BTreeMap<TaskId, ManualTask>>,
}

/// Virtual-time scheduler and clock.
///
/// Time only moves in [`ManualScheduler::advance`]. Due tasks run in order of
/// due time, then creation order.
#[derive(Clone)]
pub struct ManualScheduler {
    state: Rc<ManualState>,
}

impl ManualScheduler {
    /// Start the virtual clock at `epoch_ms` (local Unix milliseconds).
    #[must_use]
    pub fn new(epoch_ms: i64) -> Self {
        Self {
            state: Rc::new(ManualState {
                epoch_ms,
                elapsed_ms: Cell::new(0),
                utc_offset: Cell::new(UtcOffset::UTC),
                next_id: Cell::new(1),
                tasks: RefCell::new(BTreeMap::new()),
            }),
        }
    }

    pub fn set_utc_offset(&self, offset: UtcOffset) {
        self.state.utc_offset.set(offset);
    }

    /// Milliseconds advanced since construction.
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.state.elapsed_ms.get()
    }

    /// Number of tasks that are still scheduled.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.state.tasks.borrow().len()
    }

    #[must_use]
    pub fn is_pending(&self, task: TaskId) -> bool {
        self.state.tasks.borrow().contains_key(&task)
    }

    /// Move virtual time forward by `ms`, running every task that falls due.
    pub fn advance(&self, ms: u64) {
        let target = self.state.elapsed_ms.get().saturating_add(ms);
        while let Some((id, due_ms)) = self.next_due(target) {
            self.state.elapsed_ms.set(due_ms.max(self.state.elapsed_ms.get()));
            self.run(id);
        }
        self.state.elapsed_ms.set(target);
    }

    fn next_due(&self, target: u64) -> Option<(TaskId, u64)> {
        self.state
            .tasks
            .borrow()
            .iter()
            .filter(|(_, task)| task.callback.is_some() && task.due_ms <= target)
            .min_by_key(|(id, task)| (task.due_ms, **id))
            .map(|(id, task)| (*id, task.due_ms))
    }

    fn run(&self, id: TaskId) {
        let Some(period_ms) = self.state.tasks.borrow().get(&id).map(|task| task.period_ms) else {
            return;
        };
        let callback = match period_ms {
            Some(_) => self.state.tasks.borrow_mut().get_mut(&id).and_then(|task| task.callback.take()),
            None => self.state.tasks.borrow_mut().remove(&id).and_then(|task| task.callback),
        };

        match callback {
            Some(ManualCallback::Once(callback)) => callback(),
            Some(ManualCallback::Repeat(mut callback)) => {
                callback();
                // Cancelled while running: the entry is gone and the callback drops here.
                if let Some(task) = self.state.tasks.borrow_mut().get_mut(&id) {
                    task.due_ms = task.due_ms.saturating_add(period_ms.unwrap_or(1));
                    task.callback = Some(ManualCallback::Repeat(callback));
                }
            }
            None => {}
        }
    }

    fn insert(&self, delay_ms: u32, period_ms: Option<u64>, callback: ManualCallback) -> TaskId {
        let id = TaskId(self.state.next_id.get());
        self.state.next_id.set(id.0 + 1);
        let due_ms = self.state.elapsed_ms.get().saturating_add(u64::from(delay_ms));
        self.state.tasks.borrow_mut().insert(id, ManualTask { due_ms, period_ms, callback: Some(callback) });
        id
    }
}

impl Scheduler for ManualScheduler {
    fn set_interval(&self, period_ms: u32, callback: Box<dyn FnMut()>) -> TaskId {
        let period_ms = period_ms.max(1);
        self.insert(period_ms, Some(u64::from(period_ms)), ManualCallback::Repeat(callback))
    }

    fn set_timeout(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> TaskId {
        self.insert(delay_ms, None, ManualCallback::Once(callback))
    }

    fn cancel(&self, task: TaskId) {
        // Drop outside the borrow; a callback may own handles that re-enter.
        let removed = self.state.tasks.borrow_mut().remove(&task);
        drop(removed);
    }
}

impl LocalClock for ManualScheduler {
    fn now_ms(&self) -> i64 {
        let elapsed = i64::try_from(self.state.elapsed_ms.get()).unwrap_or(i64::MAX);
        self.state.epoch_ms.saturating_add(elapsed)
    }

    fn utc_offset(&self) -> UtcOffset {
        self.state.utc_offset.get()
    }
}
