//! Page seams: display targets, viewport, detachment and resize notifications.
//!
//! The engine holds targets only to observe them; it never owns page
//! elements, and a target that has been removed from the document simply
//! reports `is_connected() == false`.

#[cfg(test)]
#[path = "surface_test.rs"]
mod surface_test;

use std::fmt;
use std::rc::Rc;

use crate::error::RenderError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// One element the engine writes into.
pub trait DisplayTarget {
    /// # Errors
    ///
    /// Returns [`RenderError`] when the host rejects the write.
    fn set_text(&self, text: &str) -> Result<(), RenderError>;

    /// Add a CSS class. Adding a class that is already present is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError`] when the host rejects the write.
    fn add_class(&self, class: &str) -> Result<(), RenderError>;

    /// Remove a CSS class. Removing an absent class is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError`] when the host rejects the write.
    fn remove_class(&self, class: &str) -> Result<(), RenderError>;

    /// Whether the element already holds rendered child content.
    fn has_content(&self) -> bool;

    /// Remove all child content.
    fn clear(&self);

    /// Whether the element is still attached to the document.
    fn is_connected(&self) -> bool;
}

pub trait Surface {
    /// Look up an attached element by id.
    fn element(&self, id: &str) -> Option<Rc<dyn DisplayTarget>>;

    fn viewport(&self) -> Viewport;

    /// Call `on_detach` once the element currently holding `id` leaves the
    /// document. Dropping the returned [`Subscription`] stops observing.
    ///
    /// Hosts without mutation observation return `None`; tickers then notice
    /// detachment on their next tick instead.
    fn watch_detach(&self, _id: &str, _on_detach: Box<dyn Fn()>) -> Option<Subscription> {
        None
    }

    /// Call `on_resize` whenever the viewport changes size.
    fn on_resize(&self, _on_resize: Box<dyn Fn()>) -> Option<Subscription> {
        None
    }
}

/// Guard that releases a host registration when dropped.
pub struct Subscription {
    release: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(release: impl FnOnce() + 'static) -> Self {
        Self { release: Some(Box::new(release)) }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("active", &self.release.is_some()).finish()
    }
}
