//! Stats command for bucketed daily/weekly/monthly summaries.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::TimeZone;
use tw_core::clock::{Clock, format_minutes_label, seconds_to_minutes};
use tw_core::stats::{ActivityRow, StatsReport};
use tw_core::{Period, StatsEngine};
use tw_db::Database;

pub fn run<W, C, Tz>(
    writer: &mut W,
    db: &Database,
    clock: C,
    tz: Tz,
    period: Period,
    offset: u32,
    json: bool,
) -> Result<()>
where
    W: Write,
    C: Clock,
    Tz: TimeZone,
{
    let report = StatsEngine::new(db, clock, tz)
        .stats(period, offset)
        .context("failed to compute stats")?;
    if json {
        serde_json::to_writer_pretty(&mut *writer, &report).context("failed to serialize stats")?;
        writeln!(writer)?;
        return Ok(());
    }
    write_report(writer, &report)
}

fn write_report<W: Write>(writer: &mut W, report: &StatsReport) -> Result<()> {
    let title = match report.period {
        Period::Daily => "Daily",
        Period::Weekly => "Weekly",
        Period::Monthly => "Monthly",
    };
    writeln!(writer, "{title} stats (offset {})", report.offset)?;
    writeln!(writer)?;
    writeln!(writer, "{:<9} {:>9} {:>9}", "Unit", "Tracked", "Inactive")?;
    for (index, unit) in report.units.iter().enumerate() {
        writeln!(
            writer,
            "{:<9} {:>9} {:>9}",
            unit.label,
            format_minutes_label(report.tracked[index]),
            format_minutes_label(report.inactivity[index]),
        )?;
    }
    writeln!(
        writer,
        "{:<9} {:>9}",
        "Total",
        format_minutes_label(seconds_to_minutes(report.total_seconds()))
    )?;

    writeln!(writer)?;
    if report.table.is_empty() {
        writeln!(writer, "No sessions in this window.")?;
    } else {
        writeln!(writer, "By activity:")?;
        for row in &report.table {
            write_row(writer, row)?;
        }
    }

    let mut hints = Vec::new();
    if report.has_prev {
        hints.push(format!("older: --offset {}", report.offset + 1));
    }
    if report.has_next {
        hints.push(format!("newer: --offset {}", report.offset - 1));
    }
    if !hints.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "{}", hints.join(", "))?;
    }
    Ok(())
}

fn write_row<W: Write>(writer: &mut W, row: &ActivityRow) -> Result<()> {
    let priority = row.priority.map_or("-", |p| p.as_str());
    writeln!(
        writer,
        "  {:<20} {:<7} {:>8} {:>4}%",
        row.label, priority, row.total_formatted, row.percent
    )?;
    Ok(())
}
