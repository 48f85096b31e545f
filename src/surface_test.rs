use std::cell::Cell;

use super::*;

struct Blank;

impl Surface for Blank {
    fn element(&self, _id: &str) -> Option<Rc<dyn DisplayTarget>> {
        None
    }

    fn viewport(&self) -> Viewport {
        Viewport::new(1024, 768)
    }
}

#[test]
fn subscription_releases_exactly_once_on_drop() {
    let released = Rc::new(Cell::new(0));
    let counter = Rc::clone(&released);
    let sub = Subscription::new(move || counter.set(counter.get() + 1));
    assert_eq!(released.get(), 0);
    drop(sub);
    assert_eq!(released.get(), 1);
}

#[test]
fn hosts_without_observation_return_no_subscription() {
    let surface = Blank;
    assert!(surface.watch_detach("start-countdown", Box::new(|| {})).is_none());
    assert!(surface.on_resize(Box::new(|| {})).is_none());
    assert_eq!(surface.viewport(), Viewport::new(1024, 768));
}
