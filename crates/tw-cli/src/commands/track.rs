//! Track command: runs the timer for one activity in the foreground.
//!
//! A current-thread tokio runtime drives the engine: a one-second interval
//! calls [`TimerEngine::tick`], stdin lines are read as commands, and Ctrl-C
//! stops and saves. Every engine call runs to completion before the next
//! `select!` poll, so the engine never sees concurrent calls.

use std::cell::RefCell;
use std::future::Future;
use std::io::Write;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::TimeZone;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;
use tw_core::clock::{self, Clock, format_hms, format_minutes_label, seconds_to_minutes};
use tw_core::store::{ActivityStore, SessionStore};
use tw_core::timer::{TickOutcome, TimerEngine, TimerError, TimerEvent, TimerStatus};
use tw_core::types::{Activity, Session};

/// A line typed while tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Input {
    Pause,
    Resume,
    Stop,
    Discard,
    Elapsed,
}

impl Input {
    fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "p" | "pause" => Some(Self::Pause),
            "r" | "resume" => Some(Self::Resume),
            "s" | "stop" => Some(Self::Stop),
            "x" | "reset" | "discard" => Some(Self::Discard),
            "" => Some(Self::Elapsed),
            _ => None,
        }
    }
}

/// Finds an activity by exact ID, or by case-insensitive label among
/// non-archived activities.
pub fn resolve_activity(activities: &[Activity], query: &str) -> Result<Activity> {
    if let Some(activity) = activities.iter().find(|a| a.id.as_str() == query) {
        return Ok(activity.clone());
    }
    let mut matches = activities
        .iter()
        .filter(|a| !a.archived && a.label.eq_ignore_ascii_case(query));
    match (matches.next(), matches.next()) {
        (Some(activity), None) => Ok(activity.clone()),
        (Some(_), Some(_)) => bail!("several activities are labelled {query:?}; use the ID"),
        (None, _) => bail!("no activity matches {query:?}"),
    }
}

/// Tracks `activity` until it is stopped, discarded or auto-stopped.
///
/// Blocks the calling thread on a current-thread runtime reading real stdin.
pub fn run<W, S, C, Tz>(
    writer: &mut W,
    engine: &mut TimerEngine<S, C>,
    activity: &Activity,
    tz: &Tz,
) -> Result<Option<Session>>
where
    W: Write,
    S: ActivityStore + SessionStore,
    C: Clock,
    Tz: TimeZone,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to initialize tokio runtime")?;
    let outcome = runtime.block_on(drive(
        writer,
        engine,
        activity,
        tz,
        BufReader::new(tokio::io::stdin()),
        tokio::signal::ctrl_c(),
    ));
    // The stdin reader may still be parked in a blocking read.
    runtime.shutdown_background();
    outcome
}

/// The tracking loop, with input and shutdown injected.
///
/// Returns the saved session, or `None` if it was discarded.
pub async fn drive<W, S, C, Tz, R, F>(
    writer: &mut W,
    engine: &mut TimerEngine<S, C>,
    activity: &Activity,
    tz: &Tz,
    input: R,
    shutdown: F,
) -> Result<Option<Session>>
where
    W: Write,
    S: ActivityStore + SessionStore,
    C: Clock,
    Tz: TimeZone,
    R: AsyncBufRead + Unpin,
    F: Future<Output = std::io::Result<()>>,
{
    let events: Rc<RefCell<Vec<TimerEvent>>> = Rc::default();
    let sink = Rc::clone(&events);
    let subscription = engine.subscribe(move |event| {
        if !matches!(event, TimerEvent::Tick { .. }) {
            sink.borrow_mut().push(event.clone());
        }
        Ok(())
    });

    let outcome = track_loop(writer, engine, activity, tz, input, shutdown, &events).await;
    if let Err(err) = &outcome {
        salvage(engine, err);
    }
    engine.unsubscribe(subscription);
    let flushed = flush(writer, &events, activity);
    let session = outcome?;
    flushed?;
    Ok(session)
}

/// Saves whatever is still in flight after the loop failed.
fn salvage<S, C>(engine: &mut TimerEngine<S, C>, cause: &anyhow::Error)
where
    S: ActivityStore + SessionStore,
    C: Clock,
{
    if engine.status() == TimerStatus::Idle {
        return;
    }
    match engine.stop() {
        Ok(session) => tracing::warn!(
            session = %session.id,
            seconds = session.total_duration,
            error = %cause,
            "tracking failed; in-flight session saved"
        ),
        Err(err) => tracing::warn!(
            error = %cause,
            stop_error = %err,
            "tracking failed; in-flight session could not be saved"
        ),
    }
}

async fn track_loop<W, S, C, Tz, R, F>(
    writer: &mut W,
    engine: &mut TimerEngine<S, C>,
    activity: &Activity,
    tz: &Tz,
    input: R,
    shutdown: F,
    events: &RefCell<Vec<TimerEvent>>,
) -> Result<Option<Session>>
where
    W: Write,
    S: ActivityStore + SessionStore,
    C: Clock,
    Tz: TimeZone,
    R: AsyncBufRead + Unpin,
    F: Future<Output = std::io::Result<()>>,
{
    let session = engine
        .start_session(&activity.id)
        .with_context(|| format!("cannot start {}", activity.label))?;
    flush(writer, events, activity)?;
    let today = clock::local_date(tz, session.session_start)?;
    let today_seconds = engine
        .daily_total_seconds(&activity.id, today, tz)
        .context("failed to read today's total")?;
    write_daily_progress(writer, activity, today_seconds)?;

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut lines = input.lines();
    let mut input_open = true;
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;

            signal = &mut shutdown => {
                signal.context("failed to listen for Ctrl-C")?;
                tracing::debug!("interrupted, stopping session");
                let session = engine.stop()?;
                return Ok(Some(session));
            }

            line = lines.next_line(), if input_open => {
                let Some(line) = line.context("failed to read input")? else {
                    tracing::debug!("input closed; tracking continues until Ctrl-C");
                    input_open = false;
                    continue;
                };
                let Some(command) = Input::parse(&line) else {
                    writeln!(writer, "unknown command {:?} (p, r, s, x)", line.trim())?;
                    continue;
                };
                match apply(engine, command) {
                    Ok(Some(done)) => return Ok(done),
                    Ok(None) => {}
                    Err(err @ (TimerError::Store(_) | TimerError::Clock(_))) => {
                        return Err(err.into());
                    }
                    Err(err) => writeln!(writer, "{err}")?,
                }
                if command == Input::Elapsed {
                    writeln!(writer, "{} {}", engine.status().as_str(), format_hms(engine.elapsed_seconds()))?;
                }
            }

            _ = ticker.tick() => {
                if let TickOutcome::AutoStopped(session) = engine.tick()? {
                    return Ok(Some(session));
                }
            }
        }
        flush(writer, events, activity)?;
    }
}

/// Applies one command. `Ok(Some(_))` means tracking is over.
fn apply<S, C>(
    engine: &mut TimerEngine<S, C>,
    command: Input,
) -> Result<Option<Option<Session>>, TimerError>
where
    S: ActivityStore + SessionStore,
    C: Clock,
{
    match command {
        Input::Pause => engine.pause().map(|_| None),
        Input::Resume => engine.resume().map(|_| None),
        Input::Stop => engine.stop().map(|session| Some(Some(session))),
        Input::Discard => {
            engine.reset();
            Ok(Some(None))
        }
        Input::Elapsed => Ok(None),
    }
}

fn write_daily_progress<W: Write>(writer: &mut W, activity: &Activity, seconds: i64) -> Result<()> {
    let tracked = format_minutes_label(seconds_to_minutes(seconds));
    match (activity.daily_max, activity.daily_max_percent(seconds)) {
        (Some(max), Some(percent)) => writeln!(
            writer,
            "Today so far: {tracked} of {} ({percent}%)",
            format_minutes_label(i64::from(max))
        )?,
        _ => writeln!(writer, "Today so far: {tracked}")?,
    }
    Ok(())
}

fn flush<W: Write>(
    writer: &mut W,
    events: &RefCell<Vec<TimerEvent>>,
    activity: &Activity,
) -> Result<()> {
    let pending = std::mem::take(&mut *events.borrow_mut());
    for event in &pending {
        write_event(writer, event, activity)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_event<W: Write>(writer: &mut W, event: &TimerEvent, activity: &Activity) -> Result<()> {
    match event {
        TimerEvent::Start { .. } => {
            let limit = activity
                .session_max
                .filter(|m| *m > 0)
                .map(|m| format!(" (limit {})", format_minutes_label(i64::from(m))))
                .unwrap_or_default();
            writeln!(writer, "Tracking {}{limit}", activity.label)?;
        }
        TimerEvent::Pause { snapshot } => {
            writeln!(writer, "Paused at {}", format_hms(snapshot.elapsed_seconds))?;
        }
        TimerEvent::Resume { .. } => writeln!(writer, "Resumed")?,
        TimerEvent::Stop { session, .. } => {
            writeln!(
                writer,
                "Saved {}: {}",
                activity.label,
                format_hms(session.total_duration)
            )?;
        }
        TimerEvent::AutoStop { activity, .. } => {
            let limit = activity.session_max.map_or(0, i64::from);
            writeln!(
                writer,
                "Session limit of {} reached; stopped automatically",
                format_minutes_label(limit)
            )?;
        }
        TimerEvent::Reset { .. } => writeln!(writer, "Session discarded")?,
        TimerEvent::Tick { .. } => {}
    }
    Ok(())
}
