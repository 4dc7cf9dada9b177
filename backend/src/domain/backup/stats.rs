//! Dashboard-facing summaries of the backup directory.

use chrono::{DateTime, Utc};

const BYTES_PER_MEGABYTE: f64 = 1024.0 * 1024.0;
const SECONDS_PER_MINUTE: i64 = 60;
const MINUTES_PER_HOUR: i64 = 60;
const HOURS_PER_DAY: i64 = 24;
const RELATIVE_DAY_LIMIT: i64 = 7;

/// Status label reported when no dumps exist.
pub const STATUS_NO_BACKUPS: &str = "No Backups";
/// Status label reported when at least one dump exists.
pub const STATUS_PROTECTED: &str = "Protected";
/// Status label reported when the directory could not be inspected.
pub const STATUS_ERROR: &str = "Error";

/// Aggregate view of the stored dumps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupStats {
    /// Relative time since the newest dump, `"Never"` when there is none.
    pub last_backup: String,
    /// Summed size, e.g. `"12.40 MB"`.
    pub total_size: String,
    /// Number of dumps.
    pub count: usize,
    /// One of [`STATUS_NO_BACKUPS`], [`STATUS_PROTECTED`], [`STATUS_ERROR`].
    pub status: String,
}

impl BackupStats {
    /// Stats for an empty backup directory.
    pub fn empty() -> Self {
        Self {
            last_backup: "Never".to_owned(),
            total_size: "0 MB".to_owned(),
            count: 0,
            status: STATUS_NO_BACKUPS.to_owned(),
        }
    }

    /// Degraded stats returned when the directory could not be read.
    pub fn degraded() -> Self {
        Self {
            last_backup: "Unknown".to_owned(),
            total_size: "0 MB".to_owned(),
            count: 0,
            status: STATUS_ERROR.to_owned(),
        }
    }
}

/// Format a byte count as megabytes with two decimals.
///
/// # Examples
/// ```
/// use pos_backend::domain::backup::format_megabytes;
///
/// assert_eq!(format_megabytes(1_572_864), "1.50 MB");
/// ```
#[expect(
    clippy::cast_precision_loss,
    reason = "dump sizes are far below 2^52 bytes"
)]
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / BYTES_PER_MEGABYTE)
}

/// Describe the time elapsed between `then` and `now` for humans.
///
/// Anything a week or older is shown as the calendar date of `then`.
pub fn describe_elapsed(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = now.signed_duration_since(then).num_seconds();
    if seconds < SECONDS_PER_MINUTE {
        return "Just now".to_owned();
    }
    let minutes = seconds / SECONDS_PER_MINUTE;
    if minutes < MINUTES_PER_HOUR {
        return format!("{minutes} minutes ago");
    }
    let hours = minutes / MINUTES_PER_HOUR;
    if hours < HOURS_PER_DAY {
        return format!("{hours} hours ago");
    }
    let days = hours / HOURS_PER_DAY;
    if days < RELATIVE_DAY_LIMIT {
        return format!("{days} days ago");
    }
    then.format("%Y-%m-%d").to_string()
}
