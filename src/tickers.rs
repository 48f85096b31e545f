//! The three display tickers: wall clock, activity-start countdown, QR expiry.
//!
//! Each activation renders once immediately, then once per tick. Re-activating
//! a ticker kind replaces the previous activation of that kind.

#[cfg(test)]
#[path = "tickers_test.rs"]
mod tickers_test;

use std::rc::Rc;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, warn};

use crate::engine::{CountdownEngine, EngineInner, Flow, log_tick};
use crate::error::{EngineError, RenderError};
use crate::format::{format_clock_date, format_clock_time, format_countdown};
use crate::lifecycle::{TickerHandle, TickerKind};
use crate::surface::DisplayTarget;
use crate::time_sync::unix_ms;

impl CountdownEngine {
    /// Show the server-synchronized time (and date, when the page has a date
    /// target), refreshed every tick until cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::TargetMissing`] when the page has no time target.
    pub fn start_wall_clock(&self) -> Result<TickerHandle, EngineError> {
        let inner = &self.inner;
        let ids = &inner.config.elements;
        let time_el = inner.target(&ids.current_time)?;
        let date_el = inner.host.surface.element(&ids.current_date);

        let writer = Rc::clone(&time_el);
        let render = move |inner: &Rc<EngineInner>| -> Result<Flow, RenderError> {
            inner.render_wall_clock(writer.as_ref(), date_el.as_deref())?;
            Ok(Flow::Continue)
        };
        log_tick(TickerKind::WallClock, render(inner));
        Ok(EngineInner::spawn_display_ticker(inner, TickerKind::WallClock, &ids.current_time, time_el, render))
    }

    /// Count down to the activity start, one second per tick.
    ///
    /// At zero the target switches to the configured starting label and stays
    /// there; the ticker keeps running but stops writing.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::TargetMissing`] when the page has no countdown target.
    pub fn start_activity_countdown(&self, seconds_left: i64) -> Result<TickerHandle, EngineError> {
        let inner = &self.inner;
        let id = &inner.config.elements.start_countdown;
        let target = inner.target(id)?;

        let writer = Rc::clone(&target);
        let mut remaining = seconds_left;
        let mut label_shown = false;
        let mut step = move |inner: &Rc<EngineInner>| -> Result<Flow, RenderError> {
            let current = remaining;
            remaining = remaining.saturating_sub(1);
            if current > 0 {
                writer.set_text(&format_countdown(current.unsigned_abs()))?;
            } else if !label_shown {
                writer.set_text(&inner.config.starting_label)?;
                label_shown = true;
            }
            Ok(Flow::Continue)
        };
        log_tick(TickerKind::StartCountdown, step(inner));
        Ok(EngineInner::spawn_display_ticker(inner, TickerKind::StartCountdown, id, target, step))
    }

    /// Count down to an absolute activity start instant, measured on the
    /// server's timeline. Instants in the past count as zero.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::TargetMissing`] when the page has no countdown target.
    pub fn start_activity_countdown_until(&self, start: OffsetDateTime) -> Result<TickerHandle, EngineError> {
        let seconds_left = ((unix_ms(start) - self.server_now_ms()) / 1000).max(0);
        debug!(seconds_left, "activity countdown derived from start instant");
        self.start_activity_countdown(seconds_left)
    }

    /// [`Self::start_activity_countdown_until`] for an RFC 3339 start instant.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidTimestamp`] for an unparseable instant and
    /// [`EngineError::TargetMissing`] when the page has no countdown target.
    pub fn start_activity_countdown_at(&self, start: &str) -> Result<TickerHandle, EngineError> {
        let start = OffsetDateTime::parse(start.trim(), &Rfc3339)
            .map_err(|e| EngineError::InvalidTimestamp { input: start.to_owned(), reason: e.to_string() })?;
        self.start_activity_countdown_until(start)
    }

    /// Count down the QR code's validity window, one second per tick.
    ///
    /// Once the remaining time reaches the fade threshold the QR link gets the
    /// fade class, exactly once. At zero the ticker stops and the code stays on
    /// the page.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::TargetMissing`] when the page has no countdown text target.
    pub fn start_qr_countdown(&self, time_left: i64) -> Result<TickerHandle, EngineError> {
        let inner = &self.inner;
        let ids = &inner.config.elements;
        let target = inner.target(&ids.countdown_text)?;
        let link = inner.host.surface.element(&ids.qr_link);
        if let Err(err) = inner.clear_fade(link.as_deref()) {
            warn!(error = %err, "qr fade class not removed on restart");
        }

        let writer = Rc::clone(&target);
        let mut remaining = time_left;
        let mut step = move |inner: &Rc<EngineInner>| -> Result<Flow, RenderError> {
            let shown = remaining.max(0);
            let flow = if remaining <= 0 {
                Flow::Stop
            } else {
                remaining -= 1;
                Flow::Continue
            };
            let text = writer.set_text(&shown.to_string());
            let fade = if shown <= inner.config.fade_threshold_secs {
                inner.apply_fade(link.as_deref())
            } else {
                Ok(())
            };
            text.and(fade).map(|()| flow)
        };
        if log_tick(TickerKind::QrCountdown, step(inner)) == Flow::Stop {
            return Ok(EngineInner::finish_ticker(inner, TickerKind::QrCountdown));
        }
        Ok(EngineInner::spawn_display_ticker(inner, TickerKind::QrCountdown, &ids.countdown_text, target, step))
    }
}

impl EngineInner {
    fn render_wall_clock(
        &self,
        time_el: &dyn DisplayTarget,
        date_el: Option<&dyn DisplayTarget>,
    ) -> Result<(), RenderError> {
        let now = self
            .sync
            .server_time(self.host.clock.now_ms())
            .map_err(|e| RenderError::new(e.to_string()))?
            .to_offset(self.host.clock.utc_offset());
        time_el.set_text(&format_clock_time(now))?;
        if let Some(date_el) = date_el {
            date_el.set_text(&format_clock_date(now))?;
        }
        Ok(())
    }

    /// Mark the code as fading and add the fade class to `link`. Idempotent.
    fn apply_fade(&self, link: Option<&dyn DisplayTarget>) -> Result<(), RenderError> {
        if self.qr_state.borrow().fading {
            return Ok(());
        }
        if let Some(link) = link {
            link.add_class(&self.config.fade_class)?;
        }
        self.qr_state.borrow_mut().fading = true;
        debug!(class = %self.config.fade_class, "qr fade applied");
        Ok(())
    }

    /// Start a new fade cycle: clear the flag and take the fade class back off
    /// `link` if an earlier cycle applied it.
    fn clear_fade(&self, link: Option<&dyn DisplayTarget>) -> Result<(), RenderError> {
        let was_fading = std::mem::replace(&mut self.qr_state.borrow_mut().fading, false);
        match link {
            Some(link) if was_fading => link.remove_class(&self.config.fade_class),
            _ => Ok(()),
        }
    }
}
