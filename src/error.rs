//! Error taxonomy for the countdown engine.
//!
//! DESIGN
//! ======
//! Only `InvalidTimestamp` is fatal. Every other failure degrades to "this
//! ticker does nothing" because kiosk displays have no surface for reporting
//! errors to the person standing in front of them.

#[cfg(test)]
#[path = "error_test.rs"]
mod error_test;

/// Stable machine-readable code for an error, used as a structured log field.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;
}

/// A single failed write to the page (DOM text, class list, QR render).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct RenderError(pub String);

impl RenderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid timestamp {input:?}: {reason}")]
    InvalidTimestamp { input: String, reason: String },
    #[error("display target #{0} is not present on this page")]
    TargetMissing(String),
    #[error("qr rendering capability still unavailable after {waited_ms}ms")]
    CapabilityUnavailable { waited_ms: u32 },
    #[error("render failed: {0}")]
    Render(#[from] RenderError),
}

impl ErrorCode for EngineError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidTimestamp { .. } => "E_INVALID_TIMESTAMP",
            Self::TargetMissing(_) => "E_TARGET_MISSING",
            Self::CapabilityUnavailable { .. } => "E_CAPABILITY_UNAVAILABLE",
            Self::Render(_) => "E_RENDER",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}
