//! Plan command: does the day's budgeted work fit its work target?

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{NaiveDate, TimeZone};
use tw_core::clock::{self, Clock, format_minutes_label};
use tw_core::planner::{DayPlan, PlannedActivity, plan_day};
use tw_core::store::{ActivityStore, ConfigStore};
use tw_db::Database;

/// Plans `date`, or today in `tz` when no date is given.
pub fn run<W, C, Tz>(
    writer: &mut W,
    db: &Database,
    clock: &C,
    tz: &Tz,
    date: Option<NaiveDate>,
    json: bool,
) -> Result<()>
where
    W: Write,
    C: Clock,
    Tz: TimeZone,
{
    let date = match date {
        Some(date) => date,
        None => clock::local_date(tz, clock.now_ms())?,
    };
    let activities = db.activities().context("failed to load activities")?;
    let config = db.user_config().context("failed to load preferences")?;
    let plan = plan_day(&activities, &config, date);

    if json {
        serde_json::to_writer_pretty(&mut *writer, &plan).context("failed to serialize plan")?;
        writeln!(writer)?;
        return Ok(());
    }
    write_plan(writer, &plan)
}

fn write_plan<W: Write>(writer: &mut W, plan: &DayPlan) -> Result<()> {
    let day = &plan.structure;
    writeln!(writer, "Plan for {}", day.date.format("%A %Y-%m-%d"))?;

    let planned = format_minutes_label(plan.planned_minutes);
    if day.is_working_day {
        let lunch = if day.lunch_end > day.lunch_start {
            format!(", lunch {}-{}", day.lunch_start, day.lunch_end)
        } else {
            String::new()
        };
        writeln!(writer, "Day: {}-{}{lunch}", day.day_start, day.work_window_end)?;
        let percent = plan.percent_of_target().unwrap_or(0);
        writeln!(
            writer,
            "Planned: {planned} of {} ({percent}%), {}",
            format_minutes_label(day.available_minutes),
            plan.status.as_str()
        )?;
    } else {
        writeln!(writer, "Day off")?;
        writeln!(writer, "Planned: {planned}, {}", plan.status.as_str())?;
    }

    if plan.activities.is_empty() {
        writeln!(writer, "No active activity has a daily max.")?;
        return Ok(());
    }
    let load = plan.cognitive_load_distribution;
    writeln!(
        writer,
        "Load: intense {}, moderate {}, light {}",
        format_minutes_label(load.intense),
        format_minutes_label(load.moderate),
        format_minutes_label(load.light)
    )?;
    writeln!(writer)?;
    for activity in &plan.activities {
        write_row(writer, activity)?;
    }
    Ok(())
}

fn write_row<W: Write>(writer: &mut W, activity: &PlannedActivity) -> Result<()> {
    writeln!(
        writer,
        "  {:<20} {:<9} {:<7} {:>6}",
        activity.label,
        activity.cognitive_load.as_str(),
        activity.priority.as_str(),
        format_minutes_label(activity.minutes)
    )?;
    Ok(())
}
