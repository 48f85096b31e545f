//! QR code rendering: size policy, capability seam, resize regeneration.
//!
//! SYSTEM CONTEXT
//! ==============
//! The QR payload is a check-in URL resolved by the server. Drawing is done
//! by an externally loaded capability (qrcodejs in the browser) that may not
//! be ready when the page first asks for a code, so rendering polls for it on
//! a fixed interval and gives up after a bounded wait.
//!
//! TRADE-OFFS
//! ==========
//! A resize clears the container and redraws the whole code instead of
//! scaling the existing one; the library has no resize entry point.

#[cfg(test)]
#[path = "qr_test.rs"]
mod qr_test;

use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::QrStyle;
use crate::engine::{CountdownEngine, EngineInner, Flow};
use crate::error::{EngineError, ErrorCode, RenderError};
use crate::lifecycle::TickerKind;
use crate::surface::Viewport;

const SMALL_MAX_WIDTH: u32 = 576;
const MEDIUM_MAX_WIDTH: u32 = 768;
const SHORT_MAX_HEIGHT: u32 = 800;

/// QR error-correction level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorrectLevel {
    L,
    M,
    Q,
    #[default]
    H,
}

impl CorrectLevel {
    /// Numeric value of the matching `QRCode.CorrectLevel` constant in qrcodejs.
    #[must_use]
    pub fn qrcodejs_value(self) -> u8 {
        match self {
            Self::M => 0,
            Self::L => 1,
            Self::H => 2,
            Self::Q => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrOptions {
    pub text: String,
    pub width: u32,
    pub height: u32,
    pub color_dark: String,
    pub color_light: String,
    pub correct_level: CorrectLevel,
}

impl QrOptions {
    #[must_use]
    pub fn new(text: impl Into<String>, size: u32, style: &QrStyle) -> Self {
        Self {
            text: text.into(),
            width: size,
            height: size,
            color_dark: style.color_dark.clone(),
            color_light: style.color_light.clone(),
            correct_level: style.correct_level,
        }
    }
}

/// Externally provided QR drawing routine.
pub trait QrCapability {
    /// Whether the routine has been loaded onto the page yet.
    fn is_available(&self) -> bool;

    /// Draw a code into the element with id `container_id`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError`] when the container is missing or the routine throws.
    fn render(&self, container_id: &str, options: &QrOptions) -> Result<(), RenderError>;
}

/// Pixel size of the code for a viewport.
#[must_use]
pub fn qr_size(viewport: Viewport) -> u32 {
    if viewport.width < SMALL_MAX_WIDTH {
        300.min(viewport.width.saturating_sub(60))
    } else if viewport.width < MEDIUM_MAX_WIDTH {
        360.min(viewport.width.saturating_sub(100))
    } else if viewport.height < SHORT_MAX_HEIGHT {
        340
    } else {
        420
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum QrStatus {
    /// No code drawn by the engine.
    #[default]
    Idle,
    /// Waiting for the capability to load.
    Waiting,
    Rendered,
    /// Capability never loaded within the configured wait.
    Unavailable,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QrRenderState {
    pub payload: String,
    /// Size of the most recent render, in pixels.
    pub size: u32,
    /// Set once the expiry countdown crosses the fade threshold; never cleared
    /// within a countdown cycle.
    pub fading: bool,
    pub status: QrStatus,
}

impl CountdownEngine {
    /// Render the check-in code for `payload` into the QR container.
    ///
    /// Skipped when the container already holds a code. When the capability is
    /// not loaded yet the render is deferred to a bounded poll.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::TargetMissing`] when the page has no QR container
    /// and [`EngineError::Render`] when an immediate render fails.
    pub fn render_qr(&self, payload: &str) -> Result<(), EngineError> {
        let inner = &self.inner;
        let container = inner.target(&inner.config.elements.qr_container)?;
        if container.has_content() {
            debug!("qr container already populated; skipping render");
            return Ok(());
        }
        inner.qr_state.borrow_mut().payload = payload.to_owned();

        if inner.host.qr.is_available() {
            inner.draw_qr()?;
            EngineInner::listen_resize(inner);
        } else {
            debug!(poll_ms = inner.config.capability_poll_ms, "qr capability not loaded; polling");
            inner.qr_state.borrow_mut().status = QrStatus::Waiting;
            EngineInner::poll_capability(inner);
        }
        Ok(())
    }

    /// Schedule a debounced regeneration of the code at the current viewport
    /// size. Hosts that cannot deliver resize events call this directly.
    pub fn handle_resize(&self) {
        EngineInner::schedule_regenerate(&self.inner);
    }
}

impl EngineInner {
    fn draw_qr(&self) -> Result<u32, RenderError> {
        let size = qr_size(self.host.surface.viewport());
        let options = QrOptions::new(self.qr_state.borrow().payload.clone(), size, &self.config.qr);
        self.host.qr.render(&self.config.elements.qr_container, &options)?;

        let mut state = self.qr_state.borrow_mut();
        state.size = size;
        state.status = QrStatus::Rendered;
        debug!(size, "qr code rendered");
        Ok(size)
    }

    fn poll_capability(inner: &Rc<Self>) {
        let poll_ms = inner.config.capability_poll_ms;
        let max_wait_ms = inner.config.capability_max_wait_ms;
        let mut waited_ms: u32 = 0;

        Self::schedule_interval(inner, TickerKind::QrCapabilityPoll, poll_ms, move |inner| {
            waited_ms = waited_ms.saturating_add(poll_ms);
            if inner.host.qr.is_available() {
                debug!(waited_ms, "qr capability loaded");
                Self::finish_deferred_render(inner);
                return Flow::Stop;
            }
            if waited_ms >= max_wait_ms {
                let err = EngineError::CapabilityUnavailable { waited_ms };
                warn!(code = err.error_code(), waited_ms, "{err}; giving up");
                inner.qr_state.borrow_mut().status = QrStatus::Unavailable;
                return Flow::Stop;
            }
            Flow::Continue
        });
    }

    fn finish_deferred_render(inner: &Rc<Self>) {
        let Some(container) = inner.host.surface.element(&inner.config.elements.qr_container) else {
            debug!("qr container left the page before the capability loaded");
            inner.qr_state.borrow_mut().status = QrStatus::Idle;
            return;
        };
        if container.has_content() {
            debug!("qr container populated while waiting; skipping deferred render");
            inner.qr_state.borrow_mut().status = QrStatus::Idle;
            return;
        }
        match inner.draw_qr() {
            Ok(_) => Self::listen_resize(inner),
            Err(err) => warn!(error = %err, "deferred qr render failed"),
        }
    }

    fn listen_resize(inner: &Rc<Self>) {
        if inner.resize.borrow().is_some() {
            return;
        }
        let weak = Rc::downgrade(inner);
        let subscription = inner.host.surface.on_resize(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                Self::schedule_regenerate(&inner);
            }
        }));
        *inner.resize.borrow_mut() = subscription;
    }

    /// Re-arm the debounce timer; only the last resize in a burst regenerates.
    fn schedule_regenerate(inner: &Rc<Self>) {
        if inner.qr_state.borrow().status != QrStatus::Rendered {
            return;
        }
        Self::schedule_timeout(inner, TickerKind::QrResize, inner.config.resize_debounce_ms, |inner| {
            inner.regenerate_qr();
        });
    }

    fn regenerate_qr(&self) {
        let Some(container) = self.host.surface.element(&self.config.elements.qr_container) else {
            debug!("qr container gone; skipping regeneration");
            return;
        };
        container.clear();
        if let Err(err) = self.draw_qr() {
            warn!(error = %err, "qr regeneration failed");
        }
    }
}
