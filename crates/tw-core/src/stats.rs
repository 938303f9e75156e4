//! Bucketed statistics over the session log.
//!
//! A report covers a fixed window of units (7 days, 8 weeks or 6 months)
//! ending with the unit that contains "today". `offset` pages back one whole
//! window at a time. Everything is accumulated in seconds; minutes only
//! appear in the `tracked` and `inactivity` series.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDate, TimeZone};
use serde::Serialize;
use thiserror::Error;

use crate::clock::{self, Clock, ClockError};
use crate::inactivity::DailyInactivity;
use crate::store::{ActivityStore, ConfigStore, SessionStore, StoreError};
use crate::types::{
    Activity, ActivityId, Category, CognitiveLoad, Period, Priority, Session, UserConfig,
    WeekStart,
};

/// Label used for sessions whose activity no longer exists.
pub const UNKNOWN_ACTIVITY_LABEL: &str = "Unknown";

/// Stats query failures.
#[derive(Debug, Error)]
pub enum StatsError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Clock(#[from] ClockError),
}

/// Time tracked against one activity within a unit or window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRow {
    pub activity_id: ActivityId,
    pub label: String,
    /// `None` when the activity could not be resolved.
    pub category: Option<Category>,
    /// `None` when the activity could not be resolved; such rows sort last.
    pub priority: Option<Priority>,
    pub cognitive_load: Option<CognitiveLoad>,
    pub archived: bool,
    pub total_seconds: i64,
    /// Rounded minutes, e.g. `1h 5m`.
    pub total_formatted: String,
    /// Share of the enclosing total, rounded half-up.
    pub percent: i64,
}

impl ActivityRow {
    fn new(activity_id: &ActivityId, activity: Option<&Activity>, seconds: i64, total: i64) -> Self {
        let percent = if total > 0 {
            (seconds * 100 + total / 2) / total
        } else {
            0
        };
        Self {
            activity_id: activity_id.clone(),
            label: activity.map_or_else(|| UNKNOWN_ACTIVITY_LABEL.to_string(), |a| a.label.clone()),
            category: activity.map(|a| a.category),
            priority: activity.map(|a| a.priority),
            cognitive_load: activity.map(|a| a.cognitive_load),
            archived: activity.is_some_and(|a| a.archived),
            total_seconds: seconds,
            total_formatted: clock::format_minutes_label(clock::seconds_to_minutes(seconds)),
            percent,
        }
    }

    fn sort_key(&self) -> (u8, Reverse<i64>, &str, &ActivityId) {
        (
            self.priority.map_or(u8::MAX, Priority::rank),
            Reverse(self.total_seconds),
            self.label.as_str(),
            &self.activity_id,
        )
    }
}

/// One bucket of the window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsUnit {
    pub label: String,
    /// Local midnight starting the unit, epoch ms.
    pub start_ms: i64,
    /// Local midnight starting the next unit, epoch ms (exclusive).
    pub end_ms: i64,
    pub tracked_seconds: i64,
    pub inactivity_seconds: i64,
    pub rows: Vec<ActivityRow>,
}

/// Result of one stats query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsReport {
    pub period: Period,
    pub offset: u32,
    pub labels: Vec<String>,
    /// Tracked minutes per unit.
    pub tracked: Vec<i64>,
    /// Inactivity minutes per unit.
    pub inactivity: Vec<i64>,
    pub units: Vec<StatsUnit>,
    /// Per-activity rows across the whole window.
    pub table: Vec<ActivityRow>,
    pub has_prev: bool,
    pub has_next: bool,
}

impl StatsReport {
    /// Tracked seconds across the whole window.
    #[must_use]
    pub fn total_seconds(&self) -> i64 {
        self.units.iter().map(|u| u.tracked_seconds).sum()
    }
}

/// Everything a report is computed from.
#[derive(Debug, Clone, Copy)]
pub struct StatsInput<'a> {
    pub sessions: &'a [Session],
    pub activities: &'a [Activity],
    pub config: &'a UserConfig,
    pub now_ms: i64,
}

/// Reads the stores and clock, then builds reports in a fixed zone.
#[derive(Debug)]
pub struct StatsEngine<'a, S, C, Tz> {
    store: &'a S,
    clock: C,
    tz: Tz,
}

impl<'a, S, C, Tz> StatsEngine<'a, S, C, Tz>
where
    S: ActivityStore + SessionStore + ConfigStore,
    C: Clock,
    Tz: TimeZone,
{
    pub fn new(store: &'a S, clock: C, tz: Tz) -> Self {
        Self { store, clock, tz }
    }

    /// Builds the report for `period`, `offset` windows back from now.
    pub fn stats(&self, period: Period, offset: u32) -> Result<StatsReport, StatsError> {
        let sessions = self.store.sessions()?;
        let activities = self.store.activities()?;
        let config = self.store.user_config()?;
        let input = StatsInput {
            sessions: &sessions,
            activities: &activities,
            config: &config,
            now_ms: self.clock.now_ms(),
        };
        let report = build_report(&input, &self.tz, period, offset)?;
        tracing::debug!(
            period = %period,
            offset,
            sessions = sessions.len(),
            tracked_seconds = report.total_seconds(),
            "stats computed"
        );
        Ok(report)
    }
}

/// Computes a report without touching any store.
pub fn build_report<Tz: TimeZone>(
    input: &StatsInput<'_>,
    tz: &Tz,
    period: Period,
    offset: u32,
) -> Result<StatsReport, StatsError> {
    let today = clock::local_date(tz, input.now_ms)?;
    let dates = window_dates(period, input.config.week_start, today, offset)?;
    let bounds: Vec<i64> = dates.iter().map(|d| clock::start_of_day(tz, *d)).collect();
    let unit_count = dates.len() - 1;

    let mut per_unit: Vec<BTreeMap<&ActivityId, i64>> = vec![BTreeMap::new(); unit_count];
    for session in input.sessions {
        let Some(unit) = unit_index(&bounds, session.session_start) else {
            continue;
        };
        *per_unit[unit].entry(&session.activity_id).or_default() += session.tracked_seconds();
    }

    let by_id: HashMap<&ActivityId, &Activity> =
        input.activities.iter().map(|a| (&a.id, a)).collect();
    let lookup = |id: &ActivityId| by_id.get(id).copied();
    if let Some(missing) = per_unit
        .iter()
        .flat_map(BTreeMap::keys)
        .find(|id| lookup(**id).is_none())
    {
        tracing::warn!(activity = %missing, "sessions reference an unknown activity");
    }

    let inactivity =
        DailyInactivity::build(input.sessions, input.config.daily_work_targets, tz, today)?;

    let mut window_totals: BTreeMap<&ActivityId, i64> = BTreeMap::new();
    let mut units = Vec::with_capacity(unit_count);
    for (index, totals) in per_unit.iter().enumerate() {
        let tracked_seconds: i64 = totals.values().sum();
        let rows = sorted_rows(totals, tracked_seconds, lookup);
        for (id, seconds) in totals {
            *window_totals.entry(*id).or_default() += *seconds;
        }
        units.push(StatsUnit {
            label: unit_label(period, dates[index]),
            start_ms: bounds[index],
            end_ms: bounds[index + 1],
            tracked_seconds,
            inactivity_seconds: inactivity.for_range(dates[index], dates[index + 1]),
            rows,
        });
    }

    let window_total: i64 = window_totals.values().sum();
    let table = sorted_rows(&window_totals, window_total, lookup);
    let earliest = input.sessions.iter().map(|s| s.session_start).min();

    Ok(StatsReport {
        period,
        offset,
        labels: units.iter().map(|u| u.label.clone()).collect(),
        tracked: units
            .iter()
            .map(|u| clock::seconds_to_minutes(u.tracked_seconds))
            .collect(),
        inactivity: units
            .iter()
            .map(|u| clock::seconds_to_minutes(u.inactivity_seconds))
            .collect(),
        units,
        table,
        has_prev: earliest.is_some_and(|first| first < bounds[0]),
        has_next: offset > 0,
    })
}

/// The `unit_count + 1` boundary dates of the window, oldest first.
fn window_dates(
    period: Period,
    week_start: WeekStart,
    today: NaiveDate,
    offset: u32,
) -> Result<Vec<NaiveDate>, ClockError> {
    let n = i64::from(period.unit_count());
    let anchor = match period {
        Period::Daily => today,
        Period::Weekly => clock::start_of_week(today, week_start),
        Period::Monthly => clock::start_of_month(today),
    };
    let shift = |date: NaiveDate, units: i64| match period {
        Period::Daily => clock::add_days(date, units),
        Period::Weekly => clock::add_days(date, units * 7),
        Period::Monthly => clock::add_months(date, units),
    };
    let newest = shift(anchor, -i64::from(offset) * n)?;
    (0..=n).map(|k| shift(newest, k - (n - 1))).collect()
}

fn unit_index(bounds: &[i64], ts_ms: i64) -> Option<usize> {
    let after = bounds.partition_point(|b| *b <= ts_ms);
    if after == 0 || after == bounds.len() {
        return None;
    }
    Some(after - 1)
}

fn unit_label(period: Period, start: NaiveDate) -> String {
    match period {
        Period::Daily | Period::Weekly => start.format("%-m/%-d").to_string(),
        Period::Monthly => start.format("%-m/%Y").to_string(),
    }
}

fn sorted_rows<'a>(
    totals: &BTreeMap<&ActivityId, i64>,
    total: i64,
    lookup: impl Fn(&ActivityId) -> Option<&'a Activity>,
) -> Vec<ActivityRow> {
    let mut rows: Vec<ActivityRow> = totals
        .iter()
        .map(|(id, seconds)| ActivityRow::new(id, lookup(*id), *seconds, total))
        .collect();
    rows.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    rows
}
