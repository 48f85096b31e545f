//! The clock-synchronized countdown engine.
//!
//! ARCHITECTURE
//! ============
//! `CountdownEngine` is owned by the page controller that activates it; there
//! is no global instance. Its state lives in an `Rc<EngineInner>` and every
//! scheduled callback holds only a `Weak` to it, so dropping the engine drops
//! the state and cancels every outstanding task.
//!
//! Tickers are added in `tickers`, the QR renderer in `qr`; both build on the
//! scheduling helpers defined here.

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, RenderError};
use crate::lifecycle::{TickerHandle, TickerKind, TickerRegistry};
use crate::qr::{QrCapability, QrRenderState};
use crate::scheduler::{LocalClock, Scheduler, TaskId};
use crate::surface::{DisplayTarget, Subscription, Surface};
use crate::time_sync::TimeSync;

/// Host capabilities injected into the engine.
#[derive(Clone)]
pub struct Host {
    pub scheduler: Rc<dyn Scheduler>,
    pub clock: Rc<dyn LocalClock>,
    pub surface: Rc<dyn Surface>,
    pub qr: Rc<dyn QrCapability>,
}

/// Whether a periodic task keeps running after the current tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Stop,
}

pub struct CountdownEngine {
    pub(crate) inner: Rc<EngineInner>,
}

pub(crate) struct EngineInner {
    pub(crate) sync: TimeSync,
    pub(crate) config: EngineConfig,
    pub(crate) host: Host,
    pub(crate) registry: Rc<TickerRegistry>,
    pub(crate) qr_state: RefCell<QrRenderState>,
    pub(crate) resize: RefCell<Option<Subscription>>,
}

impl CountdownEngine {
    /// Build an engine from the server's current time as an RFC 3339 string.
    ///
    /// The local clock is read once, here, to fix the server offset.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidTimestamp`] when `server_time` cannot be parsed.
    pub fn new(server_time: &str, config: EngineConfig, host: Host) -> Result<Self, EngineError> {
        let sync = TimeSync::from_rfc3339(server_time, host.clock.now_ms())?;
        Ok(Self::with_sync(sync, config, host))
    }

    #[must_use]
    pub fn with_sync(sync: TimeSync, config: EngineConfig, host: Host) -> Self {
        debug!(offset_ms = sync.offset_ms(), "server clock offset captured");
        let registry = Rc::new(TickerRegistry::new(Rc::clone(&host.scheduler)));
        Self {
            inner: Rc::new(EngineInner {
                sync,
                config,
                host,
                registry,
                qr_state: RefCell::new(QrRenderState::default()),
                resize: RefCell::new(None),
            }),
        }
    }

    #[must_use]
    pub fn offset_ms(&self) -> i64 {
        self.inner.sync.offset_ms()
    }

    /// Current server time in Unix milliseconds.
    #[must_use]
    pub fn server_now_ms(&self) -> i64 {
        self.inner.server_now_ms()
    }

    /// # Errors
    ///
    /// Fails only when the projected instant is outside the calendar range.
    pub fn server_now(&self) -> Result<OffsetDateTime, EngineError> {
        self.inner.sync.server_time(self.inner.host.clock.now_ms())
    }

    #[must_use]
    pub fn is_running(&self, kind: TickerKind) -> bool {
        self.inner.registry.is_live(kind)
    }

    /// Kinds with a live task, in declaration order.
    #[must_use]
    pub fn live_tickers(&self) -> Vec<TickerKind> {
        self.inner.registry.kinds()
    }

    #[must_use]
    pub fn qr_state(&self) -> QrRenderState {
        self.inner.qr_state.borrow().clone()
    }

    /// Cancel every outstanding task and release every host subscription.
    /// The engine stays usable; tickers may be started again afterwards.
    pub fn teardown(&self) {
        let cancelled = self.inner.registry.cancel_all();
        let resize = self.inner.resize.borrow_mut().take();
        drop(resize);
        info!(cancelled, "countdown engine torn down");
    }
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        self.registry.cancel_all();
    }
}

impl EngineInner {
    pub(crate) fn server_now_ms(&self) -> i64 {
        self.sync.server_ms(self.host.clock.now_ms())
    }

    /// Look up a required display target.
    pub(crate) fn target(&self, id: &str) -> Result<Rc<dyn DisplayTarget>, EngineError> {
        self.host.surface.element(id).ok_or_else(|| {
            debug!(target_id = id, "display target absent; ticker not started");
            EngineError::TargetMissing(id.to_owned())
        })
    }

    /// Schedule `tick` every `period_ms` as the live task for `kind`, replacing
    /// any previous task of that kind. Returning [`Flow::Stop`] cancels it.
    pub(crate) fn schedule_interval<F>(inner: &Rc<Self>, kind: TickerKind, period_ms: u32, mut tick: F) -> TaskId
    where
        F: FnMut(&Rc<Self>) -> Flow + 'static,
    {
        inner.registry.cancel(kind);
        let weak = Rc::downgrade(inner);
        let own_task = Rc::new(Cell::new(None::<TaskId>));
        let own_task_cb = Rc::clone(&own_task);

        let task = inner.host.scheduler.set_interval(
            period_ms,
            Box::new(move || {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let Some(task) = own_task_cb.get() else {
                    return;
                };
                if tick(&inner) == Flow::Stop {
                    inner.registry.release(kind, task);
                }
            }),
        );
        own_task.set(Some(task));
        inner.registry.insert(kind, task);
        debug!(ticker = kind.as_str(), task = task.0, period_ms, "ticker scheduled");
        task
    }

    /// Schedule `fire` once after `delay_ms` as the live task for `kind`.
    /// Scheduling again before it fires replaces it (debounce).
    pub(crate) fn schedule_timeout<F>(inner: &Rc<Self>, kind: TickerKind, delay_ms: u32, fire: F) -> TaskId
    where
        F: FnOnce(&Rc<Self>) + 'static,
    {
        inner.registry.cancel(kind);
        let weak = Rc::downgrade(inner);
        let own_task = Rc::new(Cell::new(None::<TaskId>));
        let own_task_cb = Rc::clone(&own_task);

        let task = inner.host.scheduler.set_timeout(
            delay_ms,
            Box::new(move || {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if let Some(task) = own_task_cb.get() {
                    inner.registry.release(kind, task);
                }
                fire(&inner);
            }),
        );
        own_task.set(Some(task));
        inner.registry.insert(kind, task);
        task
    }

    /// Schedule a display ticker bound to `target`.
    ///
    /// The ticker stops when `tick` says so, when `target` is found detached
    /// at a tick, or when the surface reports the element with `watch_id` left
    /// the document. A failed render is logged and the schedule continues.
    pub(crate) fn spawn_display_ticker<F>(
        inner: &Rc<Self>,
        kind: TickerKind,
        watch_id: &str,
        target: Rc<dyn DisplayTarget>,
        mut tick: F,
    ) -> TickerHandle
    where
        F: FnMut(&Rc<Self>) -> Result<Flow, RenderError> + 'static,
    {
        let task = Self::schedule_interval(inner, kind, inner.config.tick_ms, move |inner| {
            if !target.is_connected() {
                info!(ticker = kind.as_str(), "display target detached; cancelling ticker");
                return Flow::Stop;
            }
            log_tick(kind, tick(inner))
        });

        let weak = Rc::downgrade(inner);
        let watch = inner.host.surface.watch_detach(
            watch_id,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    if inner.registry.release(kind, task) {
                        info!(ticker = kind.as_str(), "display target removed; ticker cancelled");
                    }
                }
            }),
        );
        if let Some(watch) = watch {
            inner.registry.attach_watch(kind, task, watch);
        }
        TickerHandle::new(kind, task, &inner.registry)
    }

    /// Close out an activation whose first render already reached its end.
    /// Any earlier activation of `kind` is cancelled and nothing is scheduled.
    pub(crate) fn finish_ticker(inner: &Rc<Self>, kind: TickerKind) -> TickerHandle {
        inner.registry.cancel(kind);
        debug!(ticker = kind.as_str(), "ticker finished on first render");
        TickerHandle::finished(kind, &inner.registry)
    }
}

/// Log a failed render and keep the ticker going.
pub(crate) fn log_tick(kind: TickerKind, result: Result<Flow, RenderError>) -> Flow {
    match result {
        Ok(flow) => flow,
        Err(err) => {
            warn!(ticker = kind.as_str(), error = %err, "tick render failed; continuing");
            Flow::Continue
        }
    }
}
