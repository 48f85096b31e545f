//! # presente-kiosk
//!
//! Countdown and QR-code display engine for event check-in kiosks, compiled to
//! WebAssembly and driven from the server-rendered check-in pages.
//!
//! The page hands the engine one server timestamp at load time. From then on
//! every display (wall clock, time until the activity starts, time until the
//! QR code expires) is computed on the server's timeline, so a kiosk with a
//! wrong system clock still agrees with the server.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | [`engine::CountdownEngine`] and the injected [`engine::Host`] |
//! | [`tickers`] | Wall clock, activity-start countdown, QR expiry countdown |
//! | [`qr`] | QR size policy, capability seam, resize regeneration |
//! | [`lifecycle`] | Ticker registry, [`lifecycle::TickerHandle`] cancellation |
//! | [`time_sync`] | Server/client clock offset |
//! | [`format`] | Countdown and clock text formatting |
//! | [`scheduler`] | Scheduling/clock seams and the virtual-time [`scheduler::ManualScheduler`] |
//! | [`surface`] | Display target and page seams |
//! | [`config`] | JSON-configurable element ids, thresholds and periods |
//! | [`error`] | Error taxonomy |
//! | [`telemetry`] | Log sink installation |
//! | `web` | Browser bindings and the exported `KioskController` (`hydrate` feature) |

pub mod config;
pub mod engine;
pub mod error;
pub mod format;
pub mod lifecycle;
pub mod qr;
pub mod scheduler;
pub mod surface;
pub mod telemetry;
pub mod tickers;
pub mod time_sync;
#[cfg(feature = "hydrate")]
pub mod web;

#[cfg(test)]
#[path = "fake_dom_test.rs"]
pub(crate) mod fake_dom;
