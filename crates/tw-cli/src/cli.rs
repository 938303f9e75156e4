//! Command-line argument definitions.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tw_core::Period;
use tw_core::clock::parse_date_key;

/// Single-activity time tracker.
///
/// Times one activity at a time with pauses and per-session limits, and
/// summarizes the history into daily, weekly and monthly stats.
#[derive(Debug, Parser)]
#[command(name = "tw", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Track an activity until stopped.
    ///
    /// While tracking, type `p` to pause, `r` to resume, `s` to stop and
    /// save, `x` to discard, or an empty line for the elapsed time. Ctrl-C
    /// stops and saves.
    Track {
        /// Activity ID or label (case-insensitive).
        activity: String,
    },

    /// Show bucketed stats for a period.
    Stats {
        /// daily (7 days), weekly (8 weeks) or monthly (6 months).
        #[arg(default_value = "daily")]
        period: Period,

        /// Number of windows to go back (0 = the current one).
        #[arg(long, default_value_t = 0)]
        offset: u32,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List completed sessions, newest first.
    History {
        /// Show at most this many sessions.
        #[arg(long)]
        limit: Option<usize>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List activities with today's tracked time.
    Activities {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Check whether the daily maxes of active activities fit a day.
    Plan {
        /// Day to plan as YYYY-MM-DD (defaults to today).
        #[arg(value_parser = parse_date)]
        date: Option<NaiveDate>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Write activities, sessions and preferences as JSON to stdout.
    Export {
        /// Write the session log as CSV instead.
        #[arg(long)]
        csv: bool,
    },

    /// Replace all data with a previously exported bundle.
    Import {
        /// Bundle file, or `-` for stdin.
        file: PathBuf,
    },

    /// Show database location and a summary of stored data.
    Status,
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    parse_date_key(value).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_defaults_to_daily() {
        let cli = Cli::try_parse_from(["tw", "stats"]).unwrap();
        let Some(Commands::Stats {
            period,
            offset,
            json,
        }) = cli.command
        else {
            panic!("expected stats command");
        };
        assert_eq!(period, Period::Daily);
        assert_eq!(offset, 0);
        assert!(!json);
    }

    #[test]
    fn stats_parses_period_and_offset() {
        let cli = Cli::try_parse_from(["tw", "stats", "monthly", "--offset", "2", "--json"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Stats {
                period: Period::Monthly,
                offset: 2,
                json: true
            })
        ));
        assert!(Cli::try_parse_from(["tw", "stats", "yearly"]).is_err());
    }

    #[test]
    fn plan_parses_optional_date() {
        let cli = Cli::try_parse_from(["tw", "plan"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Plan { date: None, json: false })));

        let cli = Cli::try_parse_from(["tw", "plan", "2024-07-15", "--json"]).unwrap();
        let Some(Commands::Plan { date, json }) = cli.command else {
            panic!("expected plan command");
        };
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 7, 15));
        assert!(json);

        assert!(Cli::try_parse_from(["tw", "plan", "2024-7-15"]).is_err());
        assert!(Cli::try_parse_from(["tw", "plan", "tomorrow"]).is_err());
    }

    #[test]
    fn export_csv_flag() {
        let cli = Cli::try_parse_from(["tw", "export"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Export { csv: false })));
        let cli = Cli::try_parse_from(["tw", "export", "--csv"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Export { csv: true })));
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["tw", "status", "-v", "--config", "/tmp/tw.toml"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/tw.toml")));
    }
}
