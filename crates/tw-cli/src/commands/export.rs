//! Implementation of the `tw export` command.
//!
//! Writes every activity, the session log and user preferences as one JSON
//! bundle that `tw import` (or the original web tracker) can read back.
//! With `--csv` only the session log is written, one row per session.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use tw_core::export_bundle;
use tw_core::store::SessionStore;
use tw_core::types::Session;
use tw_db::Database;

const CSV_HEADER: [&str; 5] = ["Session ID", "Activity ID", "Start", "End", "Total Seconds"];

pub fn run<W: Write>(writer: &mut W, db: &Database, csv: bool) -> Result<()> {
    if csv {
        let sessions = db.sessions().context("failed to load sessions")?;
        write_sessions_csv(writer, &sessions)?;
        tracing::debug!(sessions = sessions.len(), "sessions exported as csv");
        return Ok(());
    }

    let bundle = export_bundle(db).context("failed to read data for export")?;
    serde_json::to_writer_pretty(&mut *writer, &bundle).context("failed to serialize bundle")?;
    writeln!(writer)?;
    tracing::debug!(
        activities = bundle.activities.len(),
        sessions = bundle.logs.len(),
        "bundle exported"
    );
    Ok(())
}

/// Every field is quoted; embedded quotes are doubled.
fn write_sessions_csv<W: Write>(writer: &mut W, sessions: &[Session]) -> Result<()> {
    write_csv_row(writer, CSV_HEADER.map(String::from))?;
    for session in sessions {
        write_csv_row(
            writer,
            [
                session.id.to_string(),
                session.activity_id.to_string(),
                iso_timestamp(Some(session.session_start)),
                iso_timestamp(session.session_end),
                session.tracked_seconds().to_string(),
            ],
        )?;
    }
    Ok(())
}

fn write_csv_row<W: Write>(writer: &mut W, fields: [String; 5]) -> Result<()> {
    let line = fields
        .iter()
        .map(|field| format!("\"{}\"", field.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(",");
    writeln!(writer, "{line}")?;
    Ok(())
}

/// UTC with milliseconds, e.g. `2024-07-15T09:00:00.000Z`. Empty when unset.
fn iso_timestamp(ms: Option<i64>) -> String {
    ms.and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default()
}
