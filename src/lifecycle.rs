//! Ticker registry and cancellation handles.
//!
//! DESIGN
//! ======
//! Every periodic task the engine creates is recorded here under its
//! [`TickerKind`]. Recording a new task for a kind cancels the previous one,
//! so at most one task per kind is ever live. Detachment watches are stored
//! next to the task they guard and are released together with it.

#[cfg(test)]
#[path = "lifecycle_test.rs"]
mod lifecycle_test;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::scheduler::{Scheduler, TaskId};
use crate::surface::Subscription;

/// Logical ticker slots. One live task per slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TickerKind {
    WallClock,
    StartCountdown,
    QrCountdown,
    /// Debounce timer between a resize and the QR regeneration.
    QrResize,
    /// Poll waiting for the QR capability to load.
    QrCapabilityPoll,
}

impl TickerKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WallClock => "wall_clock",
            Self::StartCountdown => "start_countdown",
            Self::QrCountdown => "qr_countdown",
            Self::QrResize => "qr_resize",
            Self::QrCapabilityPoll => "qr_capability_poll",
        }
    }
}

struct LiveTicker {
    task: TaskId,
    watch: Option<Subscription>,
}

pub(crate) struct TickerRegistry {
    scheduler: Rc<dyn Scheduler>,
    live: RefCell<HashMap<TickerKind, LiveTicker>>,
}

impl TickerRegistry {
    pub(crate) fn new(scheduler: Rc<dyn Scheduler>) -> Self {
        Self { scheduler, live: RefCell::new(HashMap::new()) }
    }

    /// Record `task` as the live task for `kind`, cancelling any previous one.
    pub(crate) fn insert(&self, kind: TickerKind, task: TaskId) {
        let prior = self.live.borrow_mut().insert(kind, LiveTicker { task, watch: None });
        if let Some(prior) = prior {
            self.stop(kind, prior);
        }
    }

    /// Attach a detachment watch to `task`. Dropped immediately if `task` is
    /// no longer the live task for `kind`.
    pub(crate) fn attach_watch(&self, kind: TickerKind, task: TaskId, watch: Subscription) {
        let stale = {
            let mut live = self.live.borrow_mut();
            match live.get_mut(&kind) {
                Some(ticker) if ticker.task == task => {
                    ticker.watch = Some(watch);
                    None
                }
                _ => Some(watch),
            }
        };
        drop(stale);
    }

    /// Cancel whatever task is live for `kind`.
    pub(crate) fn cancel(&self, kind: TickerKind) -> bool {
        let removed = self.live.borrow_mut().remove(&kind);
        match removed {
            Some(ticker) => {
                self.stop(kind, ticker);
                true
            }
            None => false,
        }
    }

    /// Cancel `task` only if it is still the live task for `kind`.
    pub(crate) fn release(&self, kind: TickerKind, task: TaskId) -> bool {
        let removed = {
            let mut live = self.live.borrow_mut();
            if live.get(&kind).is_some_and(|ticker| ticker.task == task) { live.remove(&kind) } else { None }
        };
        match removed {
            Some(ticker) => {
                self.stop(kind, ticker);
                true
            }
            None => false,
        }
    }

    /// Cancel every live task. Returns how many were cancelled.
    pub(crate) fn cancel_all(&self) -> usize {
        let drained: Vec<_> = self.live.borrow_mut().drain().collect();
        let count = drained.len();
        for (kind, ticker) in drained {
            self.stop(kind, ticker);
        }
        count
    }

    pub(crate) fn is_live(&self, kind: TickerKind) -> bool {
        self.live.borrow().contains_key(&kind)
    }

    pub(crate) fn is_current(&self, kind: TickerKind, task: TaskId) -> bool {
        self.live.borrow().get(&kind).is_some_and(|ticker| ticker.task == task)
    }

    #[cfg(test)]
    pub(crate) fn is_watched(&self, kind: TickerKind) -> bool {
        self.live.borrow().get(&kind).is_some_and(|ticker| ticker.watch.is_some())
    }

    pub(crate) fn kinds(&self) -> Vec<TickerKind> {
        let mut kinds: Vec<_> = self.live.borrow().keys().copied().collect();
        kinds.sort();
        kinds
    }

    fn stop(&self, kind: TickerKind, ticker: LiveTicker) {
        self.scheduler.cancel(ticker.task);
        drop(ticker.watch);
        debug!(ticker = kind.as_str(), task = ticker.task.0, "ticker stopped");
    }
}

/// Returned by every ticker activation; lets the hosting view stop that
/// ticker without tearing down the whole engine.
#[derive(Debug, Clone)]
pub struct TickerHandle {
    kind: TickerKind,
    /// `None` when the activation finished on its first render.
    task: Option<TaskId>,
    registry: Weak<TickerRegistry>,
}

impl TickerHandle {
    pub(crate) fn new(kind: TickerKind, task: TaskId, registry: &Rc<TickerRegistry>) -> Self {
        Self { kind, task: Some(task), registry: Rc::downgrade(registry) }
    }

    pub(crate) fn finished(kind: TickerKind, registry: &Rc<TickerRegistry>) -> Self {
        Self { kind, task: None, registry: Rc::downgrade(registry) }
    }

    #[must_use]
    pub fn kind(&self) -> TickerKind {
        self.kind
    }

    /// Whether this activation is still running. False once it finished, was
    /// cancelled, or was replaced by a newer activation of the same kind.
    #[must_use]
    pub fn is_active(&self) -> bool {
        let Some(task) = self.task else {
            return false;
        };
        self.registry.upgrade().is_some_and(|registry| registry.is_current(self.kind, task))
    }

    /// Stop this activation. A newer activation of the same kind is left alone.
    pub fn cancel(&self) -> bool {
        let Some(task) = self.task else {
            return false;
        };
        self.registry.upgrade().is_some_and(|registry| registry.release(self.kind, task))
    }
}
