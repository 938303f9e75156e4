//! Calendar and duration arithmetic shared by the timer and stats engines.
//!
//! All instants are epoch milliseconds (`i64`), the same representation that
//! sessions are persisted with. Conversions to calendar dates always go
//! through an explicit [`TimeZone`] so that day boundaries are "local
//! midnight" for whichever zone the caller chooses.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{
    DateTime, Datelike, Days, LocalResult, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeZone,
    Timelike, Utc,
};
use thiserror::Error;

use crate::types::WeekStart;

/// Date key format used for per-day lookups (`2024-07-15`).
pub const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

/// Errors from calendar arithmetic.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClockError {
    /// A date key was not in `YYYY-MM-DD` form.
    #[error("malformed date key: {0:?}")]
    DateKey(String),

    /// An epoch-millisecond timestamp is outside the supported calendar range.
    #[error("timestamp out of range: {0}")]
    TimestampOutOfRange(i64),

    /// Shifting a date would leave the supported calendar range.
    #[error("date arithmetic overflow from {0}")]
    DateOverflow(NaiveDate),
}

/// Source of the current instant.
///
/// The timer and stats engines never read the system time directly, which
/// keeps every time-dependent computation reproducible in tests.
pub trait Clock {
    /// Current instant in epoch milliseconds.
    fn now_ms(&self) -> i64;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> i64 {
        (**self).now_ms()
    }
}

/// Wall clock backed by [`Utc::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same instant, so a test can keep one handle while the
/// engine owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock(Arc<AtomicI64>);

impl ManualClock {
    /// Creates a clock frozen at `start_ms`.
    #[must_use]
    pub fn new(start_ms: i64) -> Self {
        Self(Arc::new(AtomicI64::new(start_ms)))
    }

    /// Jumps to an absolute instant.
    pub fn set(&self, now_ms: i64) {
        self.0.store(now_ms, Ordering::SeqCst);
    }

    /// Moves forward by `ms` milliseconds.
    pub fn advance_ms(&self, ms: i64) {
        self.0.fetch_add(ms, Ordering::SeqCst);
    }

    /// Moves forward by whole seconds.
    pub fn advance_secs(&self, secs: i64) {
        self.advance_ms(secs * 1000);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

// ========== Dates ==========

/// Converts an epoch-millisecond instant into a zoned datetime.
pub fn zoned<Tz: TimeZone>(tz: &Tz, ts_ms: i64) -> Result<DateTime<Tz>, ClockError> {
    DateTime::<Utc>::from_timestamp_millis(ts_ms)
        .map(|dt| dt.with_timezone(tz))
        .ok_or(ClockError::TimestampOutOfRange(ts_ms))
}

/// Calendar date of an instant in the given zone.
pub fn local_date<Tz: TimeZone>(tz: &Tz, ts_ms: i64) -> Result<NaiveDate, ClockError> {
    zoned(tz, ts_ms).map(|dt| dt.date_naive())
}

/// `YYYY-MM-DD` key of the local day containing `ts_ms`.
pub fn date_key<Tz: TimeZone>(tz: &Tz, ts_ms: i64) -> Result<String, ClockError> {
    local_date(tz, ts_ms).map(|date| date.format(DATE_KEY_FORMAT).to_string())
}

/// Parses a strict `YYYY-MM-DD` date key.
pub fn parse_date_key(key: &str) -> Result<NaiveDate, ClockError> {
    if key.len() != 10 {
        return Err(ClockError::DateKey(key.to_string()));
    }
    NaiveDate::parse_from_str(key, DATE_KEY_FORMAT).map_err(|_| ClockError::DateKey(key.to_string()))
}

/// Epoch milliseconds of local midnight starting `date`.
///
/// When midnight is ambiguous (DST fall-back) the earlier instant wins. When
/// midnight does not exist (DST spring-forward at 00:00) 01:00 local is used.
pub fn start_of_day<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> i64 {
    let midnight = date.and_time(NaiveTime::MIN);
    resolve_local(tz, midnight)
        .or_else(|| resolve_local(tz, midnight + chrono::Duration::hours(1)))
        .unwrap_or_else(|| tz.from_utc_datetime(&midnight))
        .timestamp_millis()
}

fn resolve_local<Tz: TimeZone>(tz: &Tz, local: NaiveDateTime) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => Some(dt),
        LocalResult::None => None,
    }
}

/// First day of the week containing `date`.
#[must_use]
pub fn start_of_week(date: NaiveDate, week_start: WeekStart) -> NaiveDate {
    let back = match week_start {
        WeekStart::Monday => date.weekday().num_days_from_monday(),
        WeekStart::Sunday => date.weekday().num_days_from_sunday(),
    };
    date - Days::new(u64::from(back))
}

/// First day of the month containing `date`.
#[must_use]
pub fn start_of_month(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.day0()))
}

/// Shifts `date` by `delta` days (negative moves back).
pub fn add_days(date: NaiveDate, delta: i64) -> Result<NaiveDate, ClockError> {
    let days = Days::new(delta.unsigned_abs());
    let shifted = if delta >= 0 {
        date.checked_add_days(days)
    } else {
        date.checked_sub_days(days)
    };
    shifted.ok_or(ClockError::DateOverflow(date))
}

/// Shifts `date` by `delta` months, clamping the day of month.
pub fn add_months(date: NaiveDate, delta: i64) -> Result<NaiveDate, ClockError> {
    let shifted = u32::try_from(delta.unsigned_abs())
        .ok()
        .map(Months::new)
        .and_then(|months| {
            if delta >= 0 {
                date.checked_add_months(months)
            } else {
                date.checked_sub_months(months)
            }
        });
    shifted.ok_or(ClockError::DateOverflow(date))
}

/// Minutes since local midnight for the instant `ts_ms`.
pub fn time_of_day_minutes<Tz: TimeZone>(tz: &Tz, ts_ms: i64) -> Result<u32, ClockError> {
    let dt = zoned(tz, ts_ms)?;
    Ok(dt.hour() * 60 + dt.minute())
}

/// Renders minutes since midnight as `HH:MM`, wrapping past 24h.
#[must_use]
pub fn format_time_of_day(minutes: u32) -> String {
    let minutes = minutes % (24 * 60);
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

// ========== Durations ==========

/// Rounds a millisecond span to whole seconds, half-up. Negative spans are 0.
#[must_use]
pub const fn round_ms_to_seconds(ms: i64) -> i64 {
    if ms <= 0 { 0 } else { (ms + 500) / 1000 }
}

/// Converts seconds to minutes, half-up. Negative inputs are 0.
///
/// Only use this at presentation boundaries; aggregate in seconds.
#[must_use]
pub const fn seconds_to_minutes(seconds: i64) -> i64 {
    if seconds <= 0 { 0 } else { (seconds + 30) / 60 }
}

/// Formats seconds as `HH:MM:SS`. Negative values render as zero.
#[must_use]
pub fn format_hms(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{hours:02}:{minutes:02}:{secs:02}")
}

/// Formats a minute count as `Xh Ym`, `Xh`, or `Ym`.
#[must_use]
pub fn format_minutes_label(minutes: i64) -> String {
    let minutes = minutes.max(0);
    let hours = minutes / 60;
    let mins = minutes % 60;
    match (hours, mins) {
        (0, m) => format!("{m}m"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h {m}m"),
    }
}
