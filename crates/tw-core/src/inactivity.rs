//! Target-capped inactivity.
//!
//! Each weekday has a work target (hours). For a calendar day the target is
//! consumed by that day's sessions in start order, capped at the target;
//! whatever is left over is inactivity. Days with no target have no
//! inactivity, and days after "today" are not counted yet.
//!
//! Sessions belong to the local day their `session_start` falls on, matching
//! how the stats buckets select sessions.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate, TimeZone};

use crate::clock::{self, ClockError};
use crate::types::{DailyWorkTargets, Session};

/// Inactivity for one day: `target - min(target, consumed)`.
///
/// `durations` must be in chronological order. Negative durations count as 0.
#[must_use]
pub fn day_inactivity_seconds(target_seconds: i64, durations: impl IntoIterator<Item = i64>) -> i64 {
    if target_seconds <= 0 {
        return 0;
    }
    let mut consumed = 0;
    for seconds in durations {
        if consumed >= target_seconds {
            break;
        }
        consumed = (consumed + seconds.max(0)).min(target_seconds);
    }
    target_seconds - consumed
}

/// Per-day inactivity over a session log, indexed once per query.
#[derive(Debug, Clone)]
pub struct DailyInactivity {
    /// `(session_start, tracked_seconds)` per local date, sorted by start.
    by_date: HashMap<NaiveDate, Vec<(i64, i64)>>,
    targets: DailyWorkTargets,
    today: NaiveDate,
}

impl DailyInactivity {
    /// Groups `sessions` by local start date.
    pub fn build<Tz: TimeZone>(
        sessions: &[Session],
        targets: DailyWorkTargets,
        tz: &Tz,
        today: NaiveDate,
    ) -> Result<Self, ClockError> {
        let mut by_date: HashMap<NaiveDate, Vec<(i64, i64)>> = HashMap::new();
        for session in sessions {
            let date = clock::local_date(tz, session.session_start)?;
            by_date
                .entry(date)
                .or_default()
                .push((session.session_start, session.tracked_seconds()));
        }
        for day in by_date.values_mut() {
            day.sort_unstable();
        }
        Ok(Self {
            by_date,
            targets,
            today,
        })
    }

    /// Inactivity seconds for one day. Always in `[0, target]`.
    #[must_use]
    pub fn for_day(&self, date: NaiveDate) -> i64 {
        if date > self.today {
            return 0;
        }
        let target = self.targets.target_seconds(date.weekday());
        let durations = self
            .by_date
            .get(&date)
            .into_iter()
            .flatten()
            .map(|(_, seconds)| *seconds);
        day_inactivity_seconds(target, durations)
    }

    /// Sum of daily inactivity over `[start, end)`.
    #[must_use]
    pub fn for_range(&self, start: NaiveDate, end: NaiveDate) -> i64 {
        start
            .iter_days()
            .take_while(|day| *day < end)
            .map(|day| self.for_day(day))
            .sum()
    }
}
