//! History command listing completed sessions.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::TimeZone;
use tw_core::history;
use tw_core::store::{ActivityStore, SessionStore};
use tw_db::Database;

pub fn run<W: Write, Tz: TimeZone>(
    writer: &mut W,
    db: &Database,
    tz: &Tz,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let activities = db.activities().context("failed to load activities")?;
    let sessions = db.sessions().context("failed to load sessions")?;
    let mut entries = history(&activities, &sessions, tz).context("failed to build history")?;
    if let Some(limit) = limit {
        entries.truncate(limit);
    }

    if json {
        serde_json::to_writer_pretty(&mut *writer, &entries)
            .context("failed to serialize history")?;
        writeln!(writer)?;
        return Ok(());
    }

    if entries.is_empty() {
        writeln!(writer, "No sessions recorded.")?;
        return Ok(());
    }
    for entry in entries {
        let end = entry.end_time.as_deref().unwrap_or("--:--");
        let flag = if entry.auto_stopped { "  (auto-stopped)" } else { "" };
        writeln!(
            writer,
            "{} {}-{}  {}  {} [{}]{flag}",
            entry.date, entry.start_time, end, entry.duration_text, entry.label, entry.priority
        )?;
    }
    Ok(())
}
