//! Core type definitions with validation.

use std::fmt;

use chrono::Weekday;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::round_ms_to_seconds;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// A string did not name a known variant.
    #[error("invalid {field}: {value}")]
    InvalidVariant { field: &'static str, value: String },

    /// A time of day was not strict `HH:MM` between `00:00` and `23:59`.
    #[error("invalid time of day {value:?}, expected HH:MM")]
    TimeOfDay { value: String },
}

/// Preferences that would make the planner or stats engine misbehave.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{weekday} work target of {hours}h must be between 0 and 24 hours")]
    WorkTarget { weekday: &'static str, hours: f64 },

    #[error("{weekday} lunch break at {lunch_start} starts before the day starts at {day_start}")]
    LunchBeforeDayStart {
        weekday: &'static str,
        day_start: TimeOfDay,
        lunch_start: TimeOfDay,
    },

    #[error("{weekday} lunch break of {minutes} minutes must be at most 180")]
    LunchDuration { weekday: &'static str, minutes: u32 },
}

/// Longest accepted daily work target.
pub const MAX_WORK_TARGET_HOURS: f64 = 24.0;

/// Longest accepted lunch break, in minutes.
pub const MAX_LUNCH_MINUTES: u32 = 180;

/// Monday-first order of the week.
pub const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Lowercase English weekday name, as used for config keys.
#[must_use]
pub const fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

/// Generates a lowercase string enum with `as_str`, `Display`, and `FromStr`.
macro_rules! define_str_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// String representation for storage.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(ValidationError::InvalidVariant {
                        field: $field_name,
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

define_str_enum!(
    /// Broad bucket an activity belongs to.
    Category, "category" {
        Professional => "professional",
        Personal => "personal",
    }
);

define_str_enum!(
    /// User-assigned importance of an activity.
    Priority, "priority" {
        Low => "low",
        Medium => "medium",
        High => "high",
    }
);

define_str_enum!(
    /// How demanding an activity is.
    CognitiveLoad, "cognitive load" {
        Light => "light",
        Moderate => "moderate",
        Intense => "intense",
    }
);

define_str_enum!(
    /// First day of the week for weekly buckets.
    WeekStart, "week start" {
        Monday => "monday",
        Sunday => "sunday",
    }
);

define_str_enum!(
    /// Bucket size for statistics.
    Period, "period" {
        Daily => "daily",
        Weekly => "weekly",
        Monthly => "monthly",
    }
);

impl Period {
    /// Number of units in one stats window.
    #[must_use]
    pub const fn unit_count(self) -> u32 {
        match self {
            Self::Daily => 7,
            Self::Weekly => 8,
            Self::Monthly => 6,
        }
    }
}

impl Priority {
    /// Sort rank: high sorts first.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::High => 0,
            Self::Medium => 1,
            Self::Low => 2,
        }
    }
}

impl CognitiveLoad {
    /// Planning rank: the most demanding work is scheduled first.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Intense => 0,
            Self::Moderate => 1,
            Self::Light => 2,
        }
    }
}

impl Default for WeekStart {
    fn default() -> Self {
        Self::Monday
    }
}

/// Generates a validated string ID newtype with common trait implementations.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new ID after validation.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                Ok(Self(id))
            }

            /// Returns the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(
    /// A validated activity identifier.
    ActivityId, "activity ID"
);

define_string_id!(
    /// A validated session identifier.
    ///
    /// New sessions get a random v4 UUID; imported sessions keep whatever
    /// non-empty ID they arrived with.
    SessionId, "session ID"
);

impl SessionId {
    /// Generates a fresh random ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// Something the user tracks time against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: ActivityId,
    pub label: String,
    pub category: Category,
    pub priority: Priority,
    pub cognitive_load: CognitiveLoad,
    /// Daily cap in minutes.
    #[serde(default)]
    pub daily_max: Option<u32>,
    /// Per-session cap in minutes; reaching it auto-stops the session.
    #[serde(default)]
    pub session_max: Option<u32>,
    #[serde(default)]
    pub archived: bool,
}

impl Activity {
    /// Per-session cap in seconds, if any. A zero cap counts as no cap.
    #[must_use]
    pub fn session_max_seconds(&self) -> Option<i64> {
        self.session_max.filter(|m| *m > 0).map(|m| i64::from(m) * 60)
    }

    /// Daily cap in seconds, if any. A zero cap counts as no cap.
    #[must_use]
    pub fn daily_max_seconds(&self) -> Option<i64> {
        self.daily_max.filter(|m| *m > 0).map(|m| i64::from(m) * 60)
    }

    /// Percent of the daily cap used by `tracked_seconds`, rounded half-up.
    #[must_use]
    pub fn daily_max_percent(&self, tracked_seconds: i64) -> Option<i64> {
        self.daily_max_seconds()
            .map(|max| (tracked_seconds.max(0) * 100 + max / 2) / max)
    }
}

/// One contiguous run of active tracking within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    /// Epoch milliseconds.
    pub start: i64,
    /// Epoch milliseconds; `None` only for the last interval of the in-flight session.
    pub end: Option<i64>,
    /// Whole seconds, `round((end - start) / 1000)`.
    pub duration: i64,
}

impl Interval {
    /// An interval that is still running.
    #[must_use]
    pub const fn open(start: i64) -> Self {
        Self {
            start,
            end: None,
            duration: 0,
        }
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// Closes the interval at `end`, deriving its duration.
    pub fn close(&mut self, end: i64) {
        self.end = Some(end);
        self.duration = round_ms_to_seconds(end - self.start);
    }
}

/// A tracked work period for one activity, made of one or more intervals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    pub activity_id: ActivityId,
    /// Epoch milliseconds.
    pub session_start: i64,
    /// Epoch milliseconds; `None` while in flight.
    pub session_end: Option<i64>,
    pub intervals: Vec<Interval>,
    /// Seconds; sum of interval durations once completed.
    #[serde(default)]
    pub total_duration: i64,
    #[serde(default)]
    pub auto_stopped: bool,
}

impl Session {
    /// A fresh in-flight session with one open interval at `now_ms`.
    #[must_use]
    pub fn begin(activity_id: ActivityId, now_ms: i64) -> Self {
        Self {
            id: SessionId::generate(),
            activity_id,
            session_start: now_ms,
            session_end: None,
            intervals: vec![Interval::open(now_ms)],
            total_duration: 0,
            auto_stopped: false,
        }
    }

    /// Sum of interval durations in seconds.
    #[must_use]
    pub fn interval_seconds(&self) -> i64 {
        self.intervals.iter().map(|i| i.duration).sum()
    }

    /// The trailing interval, if it is still open.
    pub fn open_interval_mut(&mut self) -> Option<&mut Interval> {
        self.intervals.last_mut().filter(|i| i.is_open())
    }

    /// Latest instant already recorded: the last interval's end, or its
    /// start while open. Later writes must not go before this.
    #[must_use]
    pub fn latest_instant(&self) -> i64 {
        self.intervals
            .last()
            .map_or(self.session_start, |i| i.end.unwrap_or(i.start))
            .max(self.session_start)
    }

    /// Tracked seconds, never negative.
    #[must_use]
    pub fn tracked_seconds(&self) -> i64 {
        self.total_duration.max(0)
    }
}

/// Work target hours for each weekday.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyWorkTargets {
    pub monday: f64,
    pub tuesday: f64,
    pub wednesday: f64,
    pub thursday: f64,
    pub friday: f64,
    pub saturday: f64,
    pub sunday: f64,
}

impl Default for DailyWorkTargets {
    fn default() -> Self {
        Self {
            monday: 7.0,
            tuesday: 7.0,
            wednesday: 7.0,
            thursday: 7.0,
            friday: 7.0,
            saturday: 3.0,
            sunday: 0.0,
        }
    }
}

impl DailyWorkTargets {
    /// Target hours for a weekday.
    #[must_use]
    pub const fn hours(&self, weekday: Weekday) -> f64 {
        match weekday {
            Weekday::Mon => self.monday,
            Weekday::Tue => self.tuesday,
            Weekday::Wed => self.wednesday,
            Weekday::Thu => self.thursday,
            Weekday::Fri => self.friday,
            Weekday::Sat => self.saturday,
            Weekday::Sun => self.sunday,
        }
    }

    /// Target for a weekday in whole seconds, clamped to 24 hours.
    /// Negative or NaN targets are 0.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "clamped to at most 86_400 before the cast"
    )]
    pub fn target_seconds(&self, weekday: Weekday) -> i64 {
        let hours = self.hours(weekday);
        if hours.is_nan() || hours <= 0.0 {
            return 0;
        }
        (hours.min(MAX_WORK_TARGET_HOURS) * 3600.0).round() as i64
    }
}

/// A wall-clock time as minutes since midnight, written `HH:MM`.
///
/// Parsed values run from `00:00` to `23:59`. Arithmetic saturates at
/// `24:00` so a work window never wraps into the next day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    pub const MIDNIGHT: Self = Self(0);
    const END_OF_DAY: u16 = 24 * 60;

    /// `hours:minutes`, for constants. Out-of-range values saturate.
    #[must_use]
    pub const fn at(hours: u16, minutes: u16) -> Self {
        let total = hours * 60 + minutes;
        if total > Self::END_OF_DAY {
            Self(Self::END_OF_DAY)
        } else {
            Self(total)
        }
    }

    /// Parses strict `HH:MM`.
    pub fn parse(text: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::TimeOfDay {
            value: text.to_string(),
        };
        if text.len() != 5 || text.as_bytes().get(2) != Some(&b':') {
            return Err(invalid());
        }
        let number = |part: Option<&str>| {
            part.filter(|p| p.bytes().all(|b| b.is_ascii_digit()))
                .and_then(|p| p.parse::<u16>().ok())
        };
        match (number(text.get(0..2)), number(text.get(3..5))) {
            (Some(hours), Some(minutes)) if hours < 24 && minutes < 60 => {
                Ok(Self(hours * 60 + minutes))
            }
            _ => Err(invalid()),
        }
    }

    /// Minutes since midnight, saturating at `24:00`.
    #[must_use]
    pub fn from_minutes(minutes: u32) -> Self {
        let clamped = minutes.min(u32::from(Self::END_OF_DAY));
        Self(u16::try_from(clamped).unwrap_or(Self::END_OF_DAY))
    }

    #[must_use]
    pub fn minutes(self) -> u32 {
        u32::from(self.0)
    }

    #[must_use]
    pub fn add_minutes(self, minutes: u32) -> Self {
        Self::from_minutes(self.minutes().saturating_add(minutes))
    }

    #[must_use]
    pub const fn is_midnight(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl std::str::FromStr for TimeOfDay {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TimeOfDay> for String {
    fn from(time: TimeOfDay) -> Self {
        time.to_string()
    }
}

/// One value per weekday, keyed `monday` through `sunday`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Weekly<T> {
    pub monday: T,
    pub tuesday: T,
    pub wednesday: T,
    pub thursday: T,
    pub friday: T,
    pub saturday: T,
    pub sunday: T,
}

impl<T: Copy> Weekly<T> {
    /// Same value Monday to Friday, with separate weekend values.
    #[must_use]
    pub const fn workweek(weekday: T, saturday: T, sunday: T) -> Self {
        Self {
            monday: weekday,
            tuesday: weekday,
            wednesday: weekday,
            thursday: weekday,
            friday: weekday,
            saturday,
            sunday,
        }
    }

    #[must_use]
    pub const fn get(&self, weekday: Weekday) -> T {
        match weekday {
            Weekday::Mon => self.monday,
            Weekday::Tue => self.tuesday,
            Weekday::Wed => self.wednesday,
            Weekday::Thu => self.thursday,
            Weekday::Fri => self.friday,
            Weekday::Sat => self.saturday,
            Weekday::Sun => self.sunday,
        }
    }
}

/// User preferences consumed by the timer and stats engines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserConfig {
    pub sound_enabled: bool,
    pub default_session_max_minutes: u32,
    pub default_daily_max_minutes: u32,
    pub daily_work_targets: DailyWorkTargets,
    pub week_start: WeekStart,
    /// Start of the working day. `00:00` marks a day off.
    pub day_start_times: Weekly<TimeOfDay>,
    pub lunch_break_start_times: Weekly<TimeOfDay>,
    /// Lunch length in minutes.
    pub lunch_break_durations: Weekly<u32>,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            default_session_max_minutes: 50,
            default_daily_max_minutes: 120,
            daily_work_targets: DailyWorkTargets::default(),
            week_start: WeekStart::Monday,
            day_start_times: Weekly::workweek(
                TimeOfDay::at(9, 0),
                TimeOfDay::at(10, 0),
                TimeOfDay::MIDNIGHT,
            ),
            lunch_break_start_times: Weekly::workweek(
                TimeOfDay::at(12, 0),
                TimeOfDay::at(12, 30),
                TimeOfDay::MIDNIGHT,
            ),
            lunch_break_durations: Weekly::workweek(30, 30, 0),
        }
    }
}

impl UserConfig {
    /// Checks work targets and the day structure for every weekday.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for weekday in WEEKDAYS {
            let name = weekday_name(weekday);
            let hours = self.daily_work_targets.hours(weekday);
            if !(0.0..=MAX_WORK_TARGET_HOURS).contains(&hours) {
                return Err(ConfigError::WorkTarget {
                    weekday: name,
                    hours,
                });
            }

            let day_start = self.day_start_times.get(weekday);
            let lunch_start = self.lunch_break_start_times.get(weekday);
            if !day_start.is_midnight() && !lunch_start.is_midnight() && lunch_start < day_start {
                return Err(ConfigError::LunchBeforeDayStart {
                    weekday: name,
                    day_start,
                    lunch_start,
                });
            }

            let minutes = self.lunch_break_durations.get(weekday);
            if minutes > MAX_LUNCH_MINUTES {
                return Err(ConfigError::LunchDuration {
                    weekday: name,
                    minutes,
                });
            }
        }
        Ok(())
    }
}
