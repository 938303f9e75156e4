//! Status command summarizing what is stored.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::TimeZone;
use tw_core::history;
use tw_core::store::{ActivityStore, SessionStore};
use tw_db::Database;

pub fn run<W: Write, Tz: TimeZone>(
    writer: &mut W,
    db: &Database,
    database_path: &Path,
    tz: &Tz,
) -> Result<()> {
    let activities = db.activities().context("failed to load activities")?;
    let sessions = db.sessions().context("failed to load sessions")?;

    writeln!(writer, "TimeWise status")?;
    writeln!(writer, "Database: {}", database_path.display())?;
    let archived = activities.iter().filter(|a| a.archived).count();
    writeln!(
        writer,
        "Activities: {} ({archived} archived)",
        activities.len()
    )?;
    writeln!(writer, "Sessions: {}", sessions.len())?;

    let entries = history(&activities, &sessions, tz)?;
    match entries.first() {
        Some(last) => writeln!(
            writer,
            "Last session: {}, {} {}-{} ({})",
            last.label,
            last.date,
            last.start_time,
            last.end_time.as_deref().unwrap_or("--:--"),
            last.duration_text
        )?,
        None => writeln!(writer, "No sessions recorded.")?,
    }
    Ok(())
}
