use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tw_cli::commands::{activities, export, history, import, plan, stats, status, track};
use tw_cli::{Cli, Commands, Config};
use tw_core::store::ActivityStore;
use tw_core::{SystemClock, TimerEngine};

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(tw_db::Database, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = tw_db::Database::open(&config.database_path).context("failed to open database")?;
    Ok((db, config))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // try_init: tests may have installed a subscriber already
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let mut stdout = std::io::stdout().lock();
    match &cli.command {
        Some(Commands::Track { activity }) => {
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            let activities = db.activities().context("failed to load activities")?;
            let activity = track::resolve_activity(&activities, activity)?;
            let mut engine = TimerEngine::with_system_clock(&mut db);
            track::run(&mut stdout, &mut engine, &activity, &Local)?;
        }
        Some(Commands::Stats {
            period,
            offset,
            json,
        }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            stats::run(&mut stdout, &db, SystemClock, Local, *period, *offset, *json)?;
        }
        Some(Commands::History { limit, json }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            history::run(&mut stdout, &db, &Local, *limit, *json)?;
        }
        Some(Commands::Activities { json }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            activities::run(&mut stdout, &db, &SystemClock, &Local, *json)?;
        }
        Some(Commands::Plan { date, json }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            plan::run(&mut stdout, &db, &SystemClock, &Local, *date, *json)?;
        }
        Some(Commands::Export { csv }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            export::run(&mut stdout, &db, *csv)?;
        }
        Some(Commands::Import { file }) => {
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            let summary = import::run(&mut db, file)?;
            writeln!(
                stdout,
                "Imported {} activities and {} sessions",
                summary.activities, summary.sessions
            )?;
        }
        Some(Commands::Status) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            status::run(&mut stdout, &db, &config.database_path, &Local)?;
        }
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
            writeln!(stdout)?;
        }
    }

    Ok(())
}
