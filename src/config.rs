//! Engine configuration, supplied by the page as an optional JSON blob.
//!
//! Every field has a default so a page that passes nothing (or `{}`) gets the
//! stock kiosk behavior.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::qr::CorrectLevel;

pub const DEFAULT_TICK_MS: u32 = 1_000;
pub const DEFAULT_RESIZE_DEBOUNCE_MS: u32 = 250;
pub const DEFAULT_FADE_THRESHOLD_SECS: i64 = 5;
pub const DEFAULT_CAPABILITY_POLL_MS: u32 = 100;
pub const DEFAULT_CAPABILITY_MAX_WAIT_MS: u32 = 10_000;
pub const DEFAULT_STARTING_LABEL: &str = "iniciando...";
pub const DEFAULT_FADE_CLASS: &str = "qr-fade-out";

/// Ids of the display targets the engine looks up on the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementIds {
    pub current_time: String,
    pub current_date: String,
    pub start_countdown: String,
    pub qr_container: String,
    pub countdown_text: String,
    pub qr_link: String,
}

impl Default for ElementIds {
    fn default() -> Self {
        Self {
            current_time: "current-time".to_owned(),
            current_date: "current-date".to_owned(),
            start_countdown: "start-countdown".to_owned(),
            qr_container: "qrcode".to_owned(),
            countdown_text: "countdown-text".to_owned(),
            qr_link: "qr-code-link".to_owned(),
        }
    }
}

impl ElementIds {
    fn all(&self) -> [(&'static str, &str); 6] {
        [
            ("current_time", &self.current_time),
            ("current_date", &self.current_date),
            ("start_countdown", &self.start_countdown),
            ("qr_container", &self.qr_container),
            ("countdown_text", &self.countdown_text),
            ("qr_link", &self.qr_link),
        ]
    }
}

/// Colors and error-correction level handed to the QR capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QrStyle {
    pub color_dark: String,
    pub color_light: String,
    pub correct_level: CorrectLevel,
}

impl Default for QrStyle {
    fn default() -> Self {
        Self { color_dark: "#000000".to_owned(), color_light: "#ffffff".to_owned(), correct_level: CorrectLevel::H }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Period of every display ticker.
    pub tick_ms: u32,
    /// Quiet period after the last resize before the QR code is regenerated.
    pub resize_debounce_ms: u32,
    /// Remaining seconds at which the QR code starts fading out.
    pub fade_threshold_secs: i64,
    pub capability_poll_ms: u32,
    /// Give up waiting for the QR capability after this long.
    pub capability_max_wait_ms: u32,
    pub starting_label: String,
    pub fade_class: String,
    pub elements: ElementIds,
    pub qr: QrStyle,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_ms: DEFAULT_TICK_MS,
            resize_debounce_ms: DEFAULT_RESIZE_DEBOUNCE_MS,
            fade_threshold_secs: DEFAULT_FADE_THRESHOLD_SECS,
            capability_poll_ms: DEFAULT_CAPABILITY_POLL_MS,
            capability_max_wait_ms: DEFAULT_CAPABILITY_MAX_WAIT_MS,
            starting_label: DEFAULT_STARTING_LABEL.to_owned(),
            fade_class: DEFAULT_FADE_CLASS.to_owned(),
            elements: ElementIds::default(),
            qr: QrStyle::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON config. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed JSON and
    /// [`ConfigError::Invalid`] when a value fails validation.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("tick_ms", self.tick_ms),
            ("resize_debounce_ms", self.resize_debounce_ms),
            ("capability_poll_ms", self.capability_poll_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be greater than zero")));
            }
        }
        if self.fade_threshold_secs < 0 {
            return Err(ConfigError::Invalid("fade_threshold_secs must not be negative".to_owned()));
        }
        if let Some((name, _)) = self.elements.all().into_iter().find(|(_, id)| id.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!("elements.{name} must not be empty")));
        }
        Ok(())
    }
}
