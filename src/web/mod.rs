//! Browser host: gloo timers, the live document, qrcodejs, and the exported
//! `KioskController` the check-in templates construct.
//!
//! SYSTEM CONTEXT
//! ==============
//! The kiosk pages are server-rendered. Each page loads the wasm bundle and
//! the qrcodejs script, then builds one controller:
//!
//! ```js
//! const kiosk = new KioskController("{{ server_time|date:'c' }}");
//! kiosk.startWallClock();
//! kiosk.renderQr("{{ checkin_url }}");
//! kiosk.startQrCountdown({{ time_left }});
//! ```
//!
//! TRADE-OFFS
//! ==========
//! wasm-bindgen closures must outlive any call currently executing them. A
//! ticker that cancels itself from inside its own callback would otherwise
//! free the closure mid-call, so cancelled closures are dropped on the next
//! event-loop turn instead.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use gloo_timers::callback::{Interval, Timeout};
use time::UtcOffset;
use tracing::{debug, info, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{Document, Element, MutationObserver, MutationObserverInit, Window};

use crate::config::EngineConfig;
use crate::engine::{CountdownEngine, Host};
use crate::error::{EngineError, ErrorCode, RenderError};
use crate::lifecycle::TickerHandle;
use crate::qr::{QrCapability, QrOptions};
use crate::scheduler::{LocalClock, Scheduler, TaskId};
use crate::surface::{DisplayTarget, Subscription, Surface, Viewport};
use crate::telemetry;

fn js_error(err: &JsValue) -> RenderError {
    RenderError::new(err.as_string().unwrap_or_else(|| format!("{err:?}")))
}

/// Release a closure after the current call stack unwinds.
fn defer_drop<T: 'static>(value: T) {
    Timeout::new(0, move || drop(value)).forget();
}

// =============================================================================
// SCHEDULER + CLOCK
// =============================================================================

enum BrowserTask {
    Interval(Interval),
    Timeout(Timeout),
}

impl BrowserTask {
    fn cancel(self) {
        match self {
            Self::Interval(interval) => defer_drop(interval.cancel()),
            Self::Timeout(timeout) => defer_drop(timeout.cancel()),
        }
    }
}

/// `setInterval`/`setTimeout` through gloo-timers, keyed by [`TaskId`].
#[derive(Clone, Default)]
pub struct BrowserScheduler {
    tasks: Rc<RefCell<HashMap<TaskId, BrowserTask>>>,
    next_id: Rc<Cell<u64>>,
}

impl BrowserScheduler {
    fn next_id(&self) -> TaskId {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        TaskId(id)
    }
}

impl Scheduler for BrowserScheduler {
    fn set_interval(&self, period_ms: u32, callback: Box<dyn FnMut()>) -> TaskId {
        let id = self.next_id();
        let interval = Interval::new(period_ms.max(1), callback);
        self.tasks.borrow_mut().insert(id, BrowserTask::Interval(interval));
        id
    }

    fn set_timeout(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> TaskId {
        let id = self.next_id();
        let tasks: Weak<RefCell<HashMap<TaskId, BrowserTask>>> = Rc::downgrade(&self.tasks);
        let timeout = Timeout::new(delay_ms, move || {
            if let Some(tasks) = tasks.upgrade() {
                let fired = tasks.borrow_mut().remove(&id);
                if let Some(fired) = fired {
                    fired.cancel();
                }
            }
            callback();
        });
        self.tasks.borrow_mut().insert(id, BrowserTask::Timeout(timeout));
        id
    }

    fn cancel(&self, task: TaskId) {
        let removed = self.tasks.borrow_mut().remove(&task);
        if let Some(removed) = removed {
            removed.cancel();
        }
    }
}

/// `Date.now()` and the browser's timezone.
#[derive(Clone, Copy, Debug, Default)]
pub struct BrowserClock;

impl LocalClock for BrowserClock {
    #[allow(clippy::cast_possible_truncation)]
    fn now_ms(&self) -> i64 {
        js_sys::Date::now() as i64
    }

    #[allow(clippy::cast_possible_truncation)]
    fn utc_offset(&self) -> UtcOffset {
        // getTimezoneOffset is minutes behind UTC.
        let minutes_behind = js_sys::Date::new_0().get_timezone_offset() as i32;
        UtcOffset::from_whole_seconds(-minutes_behind * 60).unwrap_or(UtcOffset::UTC)
    }
}

// =============================================================================
// DOCUMENT
// =============================================================================

struct ElementTarget(Element);

impl DisplayTarget for ElementTarget {
    fn set_text(&self, text: &str) -> Result<(), RenderError> {
        self.0.set_text_content(Some(text));
        Ok(())
    }

    fn add_class(&self, class: &str) -> Result<(), RenderError> {
        self.0.class_list().add_1(class).map_err(|e| js_error(&e))
    }

    fn remove_class(&self, class: &str) -> Result<(), RenderError> {
        self.0.class_list().remove_1(class).map_err(|e| js_error(&e))
    }

    fn has_content(&self) -> bool {
        self.0.child_element_count() > 0
    }

    fn clear(&self) {
        self.0.set_inner_html("");
    }

    fn is_connected(&self) -> bool {
        self.0.is_connected()
    }
}

/// The live document and window.
#[derive(Clone)]
pub struct BrowserSurface {
    window: Window,
    document: Document,
}

impl BrowserSurface {
    #[must_use]
    pub fn from_window() -> Option<Self> {
        let window = web_sys::window()?;
        let document = window.document()?;
        Some(Self { window, document })
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn pixels(value: Result<JsValue, JsValue>) -> u32 {
    match value {
        Ok(value) => value.as_f64().map_or(0, |px| px.max(0.0) as u32),
        Err(err) => {
            debug!(error = ?err, "viewport dimension unavailable");
            0
        }
    }
}

impl Surface for BrowserSurface {
    fn element(&self, id: &str) -> Option<Rc<dyn DisplayTarget>> {
        self.document.get_element_by_id(id).map(|el| Rc::new(ElementTarget(el)) as Rc<dyn DisplayTarget>)
    }

    fn viewport(&self) -> Viewport {
        Viewport::new(pixels(self.window.inner_width()), pixels(self.window.inner_height()))
    }

    fn watch_detach(&self, id: &str, on_detach: Box<dyn Fn()>) -> Option<Subscription> {
        let element = self.document.get_element_by_id(id)?;
        let callback = Closure::<dyn FnMut()>::new(move || {
            if !element.is_connected() {
                on_detach();
            }
        });
        let observer = match MutationObserver::new(callback.as_ref().unchecked_ref()) {
            Ok(observer) => observer,
            Err(err) => {
                warn!(target_id = id, error = ?err, "mutation observer unavailable");
                return None;
            }
        };
        let init = MutationObserverInit::new();
        init.set_child_list(true);
        init.set_subtree(true);
        if let Err(err) = observer.observe_with_options(&self.document, &init) {
            warn!(target_id = id, error = ?err, "mutation observer rejected document");
            return None;
        }
        Some(Subscription::new(move || {
            observer.disconnect();
            defer_drop(callback);
        }))
    }

    fn on_resize(&self, on_resize: Box<dyn Fn()>) -> Option<Subscription> {
        let callback = Closure::<dyn FnMut()>::new(move || on_resize());
        if let Err(err) = self.window.add_event_listener_with_callback("resize", callback.as_ref().unchecked_ref())
        {
            warn!(error = ?err, "resize listener rejected");
            return None;
        }
        let window = self.window.clone();
        Some(Subscription::new(move || {
            if let Err(err) = window.remove_event_listener_with_callback("resize", callback.as_ref().unchecked_ref()) {
                warn!(error = ?err, "resize listener removal failed");
            }
            defer_drop(callback);
        }))
    }
}

// =============================================================================
// QRCODEJS
// =============================================================================

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_name = QRCode)]
    type QrCodeInstance;

    #[wasm_bindgen(constructor, js_class = "QRCode", catch)]
    fn new(element: &Element, options: &js_sys::Object) -> Result<QrCodeInstance, JsValue>;
}

/// The global `QRCode` constructor loaded by the qrcodejs script tag.
#[derive(Clone)]
pub struct QrCodeJs {
    document: Document,
}

impl QrCodeJs {
    #[must_use]
    pub fn new(document: Document) -> Self {
        Self { document }
    }
}

fn set_option(options: &js_sys::Object, key: &str, value: &JsValue) -> Result<(), RenderError> {
    match js_sys::Reflect::set(options, &JsValue::from_str(key), value) {
        Ok(true) => Ok(()),
        Ok(false) => Err(RenderError::new(format!("qr option {key} was not accepted"))),
        Err(err) => Err(js_error(&err)),
    }
}

impl QrCapability for QrCodeJs {
    fn is_available(&self) -> bool {
        js_sys::Reflect::get(&js_sys::global(), &JsValue::from_str("QRCode")).is_ok_and(|ctor| ctor.is_function())
    }

    fn render(&self, container_id: &str, options: &QrOptions) -> Result<(), RenderError> {
        let container = self
            .document
            .get_element_by_id(container_id)
            .ok_or_else(|| RenderError::new(format!("qr container #{container_id} not found")))?;
        let js_options = js_sys::Object::new();
        set_option(&js_options, "text", &JsValue::from_str(&options.text))?;
        set_option(&js_options, "width", &JsValue::from(options.width))?;
        set_option(&js_options, "height", &JsValue::from(options.height))?;
        set_option(&js_options, "colorDark", &JsValue::from_str(&options.color_dark))?;
        set_option(&js_options, "colorLight", &JsValue::from_str(&options.color_light))?;
        set_option(&js_options, "correctLevel", &JsValue::from(options.correct_level.qrcodejs_value()))?;
        QrCodeInstance::new(&container, &js_options).map(drop).map_err(|e| js_error(&e))
    }
}

// =============================================================================
// PAGE CONTROLLER
// =============================================================================

#[wasm_bindgen(start)]
pub fn start() {
    if !telemetry::init() {
        debug!("log sink already installed");
    }
}

fn js_failure(err: &impl std::fmt::Display) -> JsError {
    JsError::new(&err.to_string())
}

fn started(result: Result<TickerHandle, EngineError>) -> bool {
    match result {
        Ok(handle) => {
            debug!(ticker = handle.kind().as_str(), "ticker started from page");
            true
        }
        Err(err @ EngineError::TargetMissing(_)) => {
            debug!(code = err.error_code(), "{err}");
            false
        }
        Err(err) => {
            warn!(code = err.error_code(), "{err}");
            false
        }
    }
}

/// Page controller owning one [`CountdownEngine`] wired to the browser.
#[wasm_bindgen]
pub struct KioskController {
    engine: CountdownEngine,
}

#[wasm_bindgen]
impl KioskController {
    /// # Errors
    ///
    /// Throws when the config JSON is invalid, the page has no document, or
    /// `server_time` is not an RFC 3339 instant.
    #[wasm_bindgen(constructor)]
    pub fn new(server_time: &str, config_json: Option<String>) -> Result<KioskController, JsError> {
        let config = match config_json.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => EngineConfig::from_json(raw).map_err(|e| js_failure(&e))?,
            _ => EngineConfig::default(),
        };
        let surface = BrowserSurface::from_window().ok_or_else(|| JsError::new("no window document"))?;
        let host = Host {
            scheduler: Rc::new(BrowserScheduler::default()),
            clock: Rc::new(BrowserClock),
            qr: Rc::new(QrCodeJs::new(surface.document.clone())),
            surface: Rc::new(surface),
        };
        let engine = CountdownEngine::new(server_time, config, host).map_err(|e| js_failure(&e))?;
        info!(offset_ms = engine.offset_ms(), "kiosk controller ready");
        Ok(Self { engine })
    }

    #[wasm_bindgen(js_name = startWallClock)]
    pub fn start_wall_clock(&self) -> bool {
        started(self.engine.start_wall_clock())
    }

    #[wasm_bindgen(js_name = startActivityCountdown)]
    pub fn start_activity_countdown(&self, seconds: f64) -> bool {
        started(self.engine.start_activity_countdown(whole_seconds(seconds)))
    }

    #[wasm_bindgen(js_name = startActivityCountdownAt)]
    pub fn start_activity_countdown_at(&self, start: &str) -> bool {
        started(self.engine.start_activity_countdown_at(start))
    }

    #[wasm_bindgen(js_name = startQrCountdown)]
    pub fn start_qr_countdown(&self, seconds: f64) -> bool {
        started(self.engine.start_qr_countdown(whole_seconds(seconds)))
    }

    #[wasm_bindgen(js_name = renderQr)]
    pub fn render_qr(&self, payload: &str) -> bool {
        match self.engine.render_qr(payload) {
            Ok(()) => true,
            Err(err) => {
                debug!(code = err.error_code(), "{err}");
                false
            }
        }
    }

    #[wasm_bindgen(js_name = handleResize)]
    pub fn handle_resize(&self) {
        self.engine.handle_resize();
    }

    #[wasm_bindgen(js_name = serverNowMs)]
    #[allow(clippy::cast_precision_loss)]
    pub fn server_now_ms(&self) -> f64 {
        self.engine.server_now_ms() as f64
    }

    pub fn teardown(&self) {
        self.engine.teardown();
    }
}

/// Template values arrive as JS numbers; fractions are truncated.
#[allow(clippy::cast_possible_truncation)]
fn whole_seconds(seconds: f64) -> i64 {
    if seconds.is_finite() { seconds.trunc() as i64 } else { 0 }
}
