//! Server/client clock offset.
//!
//! SYSTEM CONTEXT
//! ==============
//! Kiosk machines often run with a wrong system clock. The page hands the
//! engine one authoritative server instant at load time; every later reading
//! of the local clock is projected onto the server's timeline through a single
//! fixed offset so countdowns agree with the server regardless of skew.

#[cfg(test)]
#[path = "time_sync_test.rs"]
mod time_sync_test;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::error::EngineError;

/// Fixed `server - client` offset captured once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSync {
    offset_ms: i64,
}

impl TimeSync {
    /// Parse an RFC 3339 server instant (e.g. Django's `isoformat()` output)
    /// and pair it with the local clock reading taken at the same moment.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidTimestamp`] when the input is not a valid
    /// RFC 3339 instant, including naive timestamps without a UTC offset.
    pub fn from_rfc3339(server_time: &str, local_ms: i64) -> Result<Self, EngineError> {
        let parsed = OffsetDateTime::parse(server_time.trim(), &Rfc3339).map_err(|e| {
            EngineError::InvalidTimestamp { input: server_time.to_owned(), reason: e.to_string() }
        })?;
        Ok(Self::from_unix_ms(unix_ms(parsed), local_ms))
    }

    #[must_use]
    pub fn from_unix_ms(server_ms: i64, local_ms: i64) -> Self {
        Self { offset_ms: server_ms.saturating_sub(local_ms) }
    }

    #[must_use]
    pub fn offset_ms(self) -> i64 {
        self.offset_ms
    }

    /// Project a local clock reading onto the server timeline.
    #[must_use]
    pub fn server_ms(self, local_ms: i64) -> i64 {
        local_ms.saturating_add(self.offset_ms)
    }

    /// Same as [`Self::server_ms`], as a UTC datetime.
    ///
    /// # Errors
    ///
    /// Fails only when the projected instant falls outside the representable
    /// calendar range.
    pub fn server_time(self, local_ms: i64) -> Result<OffsetDateTime, EngineError> {
        datetime_from_unix_ms(self.server_ms(local_ms))
    }
}

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn unix_ms(instant: OffsetDateTime) -> i64 {
    instant.unix_timestamp() * 1000 + i64::from(instant.millisecond())
}

/// Inverse of [`unix_ms`].
///
/// # Errors
///
/// Returns [`EngineError::InvalidTimestamp`] when `ms` is outside the calendar
/// range supported by `time`.
pub fn datetime_from_unix_ms(ms: i64) -> Result<OffsetDateTime, EngineError> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000)
        .map_err(|e| EngineError::InvalidTimestamp { input: ms.to_string(), reason: e.to_string() })
}
