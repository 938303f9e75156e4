//! Day structure and schedule feasibility.
//!
//! A working day starts at the configured day-start time and runs for the
//! weekday's work target plus the lunch break. Each active activity with a
//! daily max budgets that many minutes; the sum is compared against the
//! day's target to say whether the plan fits.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::clock::seconds_to_minutes;
use crate::types::{Activity, ActivityId, CognitiveLoad, Priority, TimeOfDay, UserConfig};

/// Planned load above this share of the target is tight.
const TIGHT_PERCENT: i64 = 80;

/// The shape of one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayStructure {
    pub date: NaiveDate,
    pub day_start: TimeOfDay,
    pub lunch_start: TimeOfDay,
    pub lunch_end: TimeOfDay,
    /// `00:00` on a day off.
    pub work_window_end: TimeOfDay,
    /// Work target in minutes; 0 on a day off.
    pub available_minutes: i64,
    pub is_working_day: bool,
}

/// Lays out `date` from the configured day start, lunch and work target.
///
/// A `00:00` day start marks a day off.
#[must_use]
pub fn day_structure(config: &UserConfig, date: NaiveDate) -> DayStructure {
    let weekday = date.weekday();
    let day_start = config.day_start_times.get(weekday);
    let lunch_start = config.lunch_break_start_times.get(weekday);
    let lunch_minutes = config.lunch_break_durations.get(weekday);
    let lunch_end = lunch_start.add_minutes(lunch_minutes);

    if day_start.is_midnight() {
        return DayStructure {
            date,
            day_start,
            lunch_start,
            lunch_end,
            work_window_end: TimeOfDay::MIDNIGHT,
            available_minutes: 0,
            is_working_day: false,
        };
    }

    let target = seconds_to_minutes(config.daily_work_targets.target_seconds(weekday));
    let window = u32::try_from(target).unwrap_or(0).saturating_add(lunch_minutes);
    DayStructure {
        date,
        day_start,
        lunch_start,
        lunch_end,
        work_window_end: day_start.add_minutes(window),
        available_minutes: target,
        is_working_day: true,
    }
}

/// Whether a day's planned load fits its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Feasibility {
    Feasible,
    Tight,
    NotFeasible,
    /// Work is planned on a day with no target.
    NotApplicable,
}

impl Feasibility {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Feasible => "feasible",
            Self::Tight => "tight",
            Self::NotFeasible => "not-feasible",
            Self::NotApplicable => "not-applicable",
        }
    }

    /// Traffic-light colour for displays.
    #[must_use]
    pub const fn indicator(self) -> &'static str {
        match self {
            Self::Feasible => "green",
            Self::Tight => "yellow",
            Self::NotFeasible => "red",
            Self::NotApplicable => "gray",
        }
    }
}

/// Classifies `planned` minutes against `available` minutes.
///
/// Over 100% is not feasible, over 80% is tight. An empty plan is always
/// feasible, even on a day off.
#[must_use]
pub const fn feasibility(planned: i64, available: i64) -> Feasibility {
    if planned <= 0 {
        Feasibility::Feasible
    } else if available <= 0 {
        Feasibility::NotApplicable
    } else if planned > available {
        Feasibility::NotFeasible
    } else if planned * 100 > available * TIGHT_PERCENT {
        Feasibility::Tight
    } else {
        Feasibility::Feasible
    }
}

/// Planned minutes per cognitive load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadDistribution {
    pub intense: i64,
    pub moderate: i64,
    pub light: i64,
}

impl LoadDistribution {
    fn add(&mut self, load: CognitiveLoad, minutes: i64) {
        let slot = match load {
            CognitiveLoad::Intense => &mut self.intense,
            CognitiveLoad::Moderate => &mut self.moderate,
            CognitiveLoad::Light => &mut self.light,
        };
        *slot += minutes;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedActivity {
    pub activity_id: ActivityId,
    pub label: String,
    pub cognitive_load: CognitiveLoad,
    pub priority: Priority,
    pub minutes: i64,
}

/// Feasibility of one day's plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayPlan {
    pub structure: DayStructure,
    pub planned_minutes: i64,
    pub status: Feasibility,
    pub indicator: &'static str,
    pub activities_count: usize,
    pub cognitive_load_distribution: LoadDistribution,
    /// Most demanding first, then by priority and label.
    pub activities: Vec<PlannedActivity>,
}

impl DayPlan {
    /// Planned share of the target, rounded half-up. `None` on a day off.
    #[must_use]
    pub const fn percent_of_target(&self) -> Option<i64> {
        let available = self.structure.available_minutes;
        if available <= 0 {
            return None;
        }
        Some((self.planned_minutes * 100 + available / 2) / available)
    }
}

/// Budgets every active activity's daily max against `date`'s target.
///
/// Archived activities and activities without a daily max are left out.
#[must_use]
pub fn plan_day(activities: &[Activity], config: &UserConfig, date: NaiveDate) -> DayPlan {
    let structure = day_structure(config, date);

    let mut planned: Vec<PlannedActivity> = activities
        .iter()
        .filter(|a| !a.archived)
        .filter_map(|a| {
            let minutes = a.daily_max.filter(|m| *m > 0)?;
            Some(PlannedActivity {
                activity_id: a.id.clone(),
                label: a.label.clone(),
                cognitive_load: a.cognitive_load,
                priority: a.priority,
                minutes: i64::from(minutes),
            })
        })
        .collect();
    planned.sort_by(|a, b| {
        (a.cognitive_load.rank(), a.priority.rank(), &a.label, &a.activity_id).cmp(&(
            b.cognitive_load.rank(),
            b.priority.rank(),
            &b.label,
            &b.activity_id,
        ))
    });

    let mut distribution = LoadDistribution::default();
    for activity in &planned {
        distribution.add(activity.cognitive_load, activity.minutes);
    }
    let planned_minutes = planned.iter().map(|a| a.minutes).sum();
    let status = feasibility(planned_minutes, structure.available_minutes);
    tracing::debug!(
        %date,
        planned_minutes,
        available = structure.available_minutes,
        status = status.as_str(),
        "day planned"
    );

    DayPlan {
        structure,
        planned_minutes,
        status,
        indicator: status.indicator(),
        activities_count: planned.len(),
        cognitive_load_distribution: distribution,
        activities: planned,
    }
}
