//! Small shared helpers: clocks, paths and human-readable durations.

use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::Instant;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;
const WEEK: u64 = 7 * DAY;
const MONTH: u64 = 30 * DAY;
const FAR_FUTURE: Duration = Duration::from_secs(30 * 365 * DAY);

/// Current wall-clock time in Unix milliseconds.
#[must_use]
pub fn timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

/// `base + by`, saturating to a far-future instant instead of overflowing.
#[must_use]
pub fn deadline_after(base: Instant, by: Duration) -> Instant {
    base.checked_add(by)
        .or_else(|| base.checked_add(FAR_FUTURE))
        .unwrap_or(base)
}

/// The user's home directory, falling back to the working directory.
#[must_use]
pub fn home_dir() -> PathBuf {
    dirs_next::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Base directory for bot configuration and data (`~/.mode0`).
#[must_use]
pub fn config_dir() -> PathBuf {
    home_dir().join(".mode0")
}

/// Default configuration file path (`~/.mode0/config.json`).
#[must_use]
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Default data directory for profile storage (`~/.mode0/data`).
#[must_use]
pub fn data_dir() -> PathBuf {
    config_dir().join("data")
}

/// Format a duration as a coarse human-readable string ("5 minutes").
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < MINUTE {
        plural(secs, "second")
    } else if secs < HOUR {
        plural(secs / MINUTE, "minute")
    } else if secs < DAY {
        plural(secs / HOUR, "hour")
    } else {
        plural(secs / DAY, "day")
    }
}

/// Describe how long ago `then_ms` was relative to `now_ms` ("3 hours ago").
#[must_use]
pub fn time_since(then_ms: u64, now_ms: u64) -> String {
    let secs = now_ms.saturating_sub(then_ms) / 1000;
    if secs < MINUTE {
        "just now".to_string()
    } else if secs < HOUR {
        format!("{} ago", plural(secs / MINUTE, "minute"))
    } else if secs < DAY {
        format!("{} ago", plural(secs / HOUR, "hour"))
    } else if secs < WEEK {
        format!("{} ago", plural(secs / DAY, "day"))
    } else if secs < MONTH {
        format!("{} ago", plural(secs / WEEK, "week"))
    } else {
        format!("{} ago", plural(secs / MONTH, "month"))
    }
}

fn plural(n: u64, unit: &str) -> String {
    if n == 1 {
        format!("{n} {unit}")
    } else {
        format!("{n} {unit}s")
    }
}

/// Truncate a string to at most `max_chars` characters, appending `…` when cut.
#[must_use]
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}
