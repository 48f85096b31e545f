//! Log sink installation.
//!
//! The engine emits `tracing` events. In the browser the `log` bridge of
//! `tracing` forwards them to `console_log`; natively they go to the
//! `tracing-subscriber` fmt layer.

#[cfg(test)]
#[path = "telemetry_test.rs"]
mod telemetry_test;

/// Install the log sink for the current target. Returns `false` when a sink
/// was already installed (or none exists for this target).
pub fn init() -> bool {
    #[cfg(feature = "hydrate")]
    {
        console_error_panic_hook::set_once();
        console_log::init_with_level(log::Level::Debug).is_ok()
    }
    #[cfg(all(not(feature = "hydrate"), not(target_arch = "wasm32")))]
    {
        tracing_subscriber::fmt().with_target(false).try_init().is_ok()
    }
    #[cfg(all(not(feature = "hydrate"), target_arch = "wasm32"))]
    {
        false
    }
}
