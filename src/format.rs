//! Text formatting for every duration and clock display.
//!
//! One pure function formats all countdowns so the start-countdown and any
//! future duration display cannot drift apart.

#[cfg(test)]
#[path = "format_test.rs"]
mod format_test;

use time::OffsetDateTime;

const SECS_PER_MINUTE: u64 = 60;
const SECS_PER_HOUR: u64 = 3_600;
const SECS_PER_DAY: u64 = 86_400;

/// Largest unit shown first in a formatted countdown.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LeadingUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

#[must_use]
pub fn leading_unit(total_seconds: u64) -> LeadingUnit {
    if total_seconds >= SECS_PER_DAY {
        LeadingUnit::Days
    } else if total_seconds >= SECS_PER_HOUR {
        LeadingUnit::Hours
    } else if total_seconds >= SECS_PER_MINUTE {
        LeadingUnit::Minutes
    } else {
        LeadingUnit::Seconds
    }
}

/// Format a remaining duration, dropping trailing units as the leading unit grows.
///
/// `90061` -> `"1d 1h 1m"`, `3725` -> `"1h 2m 5s"`, `65` -> `"1m 5s"`, `7` -> `"7s"`.
#[must_use]
pub fn format_countdown(total_seconds: u64) -> String {
    let days = total_seconds / SECS_PER_DAY;
    let hours = (total_seconds % SECS_PER_DAY) / SECS_PER_HOUR;
    let minutes = (total_seconds % SECS_PER_HOUR) / SECS_PER_MINUTE;
    let seconds = total_seconds % SECS_PER_MINUTE;

    match leading_unit(total_seconds) {
        LeadingUnit::Days => format!("{days}d {hours}h {minutes}m"),
        LeadingUnit::Hours => format!("{hours}h {minutes}m {seconds}s"),
        LeadingUnit::Minutes => format!("{minutes}m {seconds}s"),
        LeadingUnit::Seconds => format!("{seconds}s"),
    }
}

/// 24-hour `HH:MM:SS`.
#[must_use]
pub fn format_clock_time(instant: OffsetDateTime) -> String {
    format!("{:02}:{:02}:{:02}", instant.hour(), instant.minute(), instant.second())
}

/// Day-first `DD/MM/YYYY`.
#[must_use]
pub fn format_clock_date(instant: OffsetDateTime) -> String {
    format!("{:02}/{:02}/{:04}", instant.day(), u8::from(instant.month()), instant.year())
}
