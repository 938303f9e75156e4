//! Activities command listing activities with today's tracked time.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::TimeZone;
use serde::Serialize;
use tw_core::clock::{self, Clock, format_minutes_label, seconds_to_minutes};
use tw_core::store::{ActivityStore, SessionStore};
use tw_core::timer::daily_total_seconds;
use tw_core::types::Activity;
use tw_db::Database;

/// One activity plus its progress for today.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ActivityToday<'a> {
    #[serde(flatten)]
    activity: &'a Activity,
    today_seconds: i64,
    daily_max_percent: Option<i64>,
}

pub fn run<W, C, Tz>(writer: &mut W, db: &Database, clock: &C, tz: &Tz, json: bool) -> Result<()>
where
    W: Write,
    C: Clock,
    Tz: TimeZone,
{
    let activities = db.activities().context("failed to load activities")?;
    let sessions = db.sessions().context("failed to load sessions")?;
    let today = clock::local_date(tz, clock.now_ms())?;

    let mut rows = Vec::with_capacity(activities.len());
    for activity in &activities {
        let today_seconds = daily_total_seconds(&sessions, &activity.id, today, tz)?;
        rows.push(ActivityToday {
            activity,
            today_seconds,
            daily_max_percent: activity.daily_max_percent(today_seconds),
        });
    }

    if json {
        serde_json::to_writer_pretty(&mut *writer, &rows)
            .context("failed to serialize activities")?;
        writeln!(writer)?;
        return Ok(());
    }

    if rows.is_empty() {
        writeln!(writer, "No activities. Import a bundle with `tw import <file>`.")?;
        return Ok(());
    }
    for row in rows {
        let activity = row.activity;
        let mut today = format_minutes_label(seconds_to_minutes(row.today_seconds));
        if let (Some(max), Some(percent)) = (activity.daily_max, row.daily_max_percent) {
            today = format!("{today} of {} ({percent}%)", format_minutes_label(i64::from(max)));
        }
        let archived = if activity.archived { "  [archived]" } else { "" };
        writeln!(
            writer,
            "{:<12} {:<20} {}/{}/{}  today {today}{archived}",
            activity.id.as_str(),
            activity.label,
            activity.category,
            activity.priority,
            activity.cognitive_load
        )?;
    }
    Ok(())
}
