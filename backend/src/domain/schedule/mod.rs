//! Wall-clock schedules and the driver that runs jobs on them.
//!
//! Schedules are evaluated in a fixed UTC offset so a deployment can say
//! "daily at 02:00" in shop-local time without a timezone database.

mod driver;
mod guard;

pub use driver::{ScheduleDriver, ScheduleSleeper, ScheduledJob, TokioScheduleSleeper};
pub use guard::{RunGuard, RunPermit};

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Timelike, Utc};

const MINUTES_PER_DAY: u32 = 24 * 60;

/// Errors raised when building a schedule from configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    /// Interval is zero or longer than a day.
    #[error("interval must be between 1 and {MINUTES_PER_DAY} minutes, got {0}")]
    Interval(u32),
    /// Hour or minute outside the clock face.
    #[error("time of day {hour:02}:{minute:02} is out of range")]
    TimeOfDay {
        /// Requested hour.
        hour: u32,
        /// Requested minute.
        minute: u32,
    },
    /// UTC offset beyond +/- 24 hours.
    #[error("utc offset of {0} minutes is out of range")]
    Offset(i32),
}

/// When a recurring job fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Every `n` minutes, aligned to local midnight (`:00`, `:05`, ...).
    EveryMinutes(u32),
    /// Once a day at the given local time.
    DailyAt {
        /// Hour, 0-23.
        hour: u32,
        /// Minute, 0-59.
        minute: u32,
    },
}

impl Schedule {
    /// Validated interval schedule.
    pub fn every_minutes(minutes: u32) -> Result<Self, ScheduleError> {
        if minutes == 0 || minutes > MINUTES_PER_DAY {
            return Err(ScheduleError::Interval(minutes));
        }
        Ok(Self::EveryMinutes(minutes))
    }

    /// Validated daily schedule.
    pub fn daily_at(hour: u32, minute: u32) -> Result<Self, ScheduleError> {
        if hour > 23 || minute > 59 {
            return Err(ScheduleError::TimeOfDay { hour, minute });
        }
        Ok(Self::DailyAt { hour, minute })
    }

    /// First firing strictly after `now`, evaluated in `offset`.
    ///
    /// # Examples
    /// ```
    /// use chrono::{FixedOffset, TimeZone, Utc};
    /// use pos_backend::domain::schedule::Schedule;
    ///
    /// let now = Utc.with_ymd_and_hms(2024, 5, 1, 10, 2, 30).unwrap();
    /// let utc = FixedOffset::east_opt(0).unwrap();
    /// let next = Schedule::EveryMinutes(5).next_after(now, utc);
    /// assert_eq!(next, Utc.with_ymd_and_hms(2024, 5, 1, 10, 5, 0).unwrap());
    /// ```
    pub fn next_after(&self, now: DateTime<Utc>, offset: FixedOffset) -> DateTime<Utc> {
        let local = now.with_timezone(&offset);
        let midnight = local.date_naive().and_time(NaiveTime::MIN);
        let elapsed_minutes = local.hour() * 60 + local.minute();

        let candidate = match *self {
            Self::EveryMinutes(interval) => {
                let slot = (elapsed_minutes / interval + 1) * interval;
                if slot >= MINUTES_PER_DAY {
                    midnight + Duration::days(1)
                } else {
                    midnight + Duration::minutes(i64::from(slot))
                }
            }
            Self::DailyAt { hour, minute } => {
                let today = midnight + Duration::minutes(i64::from(hour * 60 + minute));
                if today > local.naive_local() {
                    today
                } else {
                    today + Duration::days(1)
                }
            }
        };

        offset
            .from_local_datetime(&candidate)
            .single()
            .map_or(now, |fire| fire.with_timezone(&Utc))
    }

    /// Human-readable description, e.g. `"Daily at 02:00"`.
    pub fn describe(&self) -> String {
        match *self {
            Self::EveryMinutes(1) => "Every minute".to_owned(),
            Self::EveryMinutes(minutes) => format!("Every {minutes} minutes"),
            Self::DailyAt { hour, minute } => format!("Daily at {hour:02}:{minute:02}"),
        }
    }
}

/// Build the offset schedules are evaluated in.
pub fn utc_offset(minutes: i32) -> Result<FixedOffset, ScheduleError> {
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or(ScheduleError::Offset(minutes))
}

/// Label an offset as `UTC`, `UTC+05:30`, `UTC-03:00`.
pub fn describe_offset(offset: FixedOffset) -> String {
    let seconds = offset.local_minus_utc();
    if seconds == 0 {
        return "UTC".to_owned();
    }
    let sign = if seconds < 0 { '-' } else { '+' };
    let minutes = seconds.unsigned_abs() / 60;
    format!("UTC{sign}{:02}:{:02}", minutes / 60, minutes % 60)
}
