//! Single-session activity timer.
//!
//! [`TimerEngine`] owns the one in-flight [`Session`] and moves it through
//! `Idle -> Running <-> Paused -> Idle`. Misuse from the UI layer (pausing an
//! idle timer, starting a second session, ...) is reported as a
//! [`TimerError`] and never changes state.
//!
//! The engine does not schedule anything itself. Starting a session arms a
//! ticker token; whoever drives the engine calls [`TimerEngine::tick`] once a
//! second while [`TimerEngine::ticker`] is `Some`. Stop and reset disarm the
//! token, so a tick that races a stop is a no-op.

mod events;
mod state;

use chrono::{NaiveDate, TimeZone};
use thiserror::Error;

pub use events::{ListenerError, ListenerResult, SubscriptionId, TimerEvent};
pub use state::{TimerSnapshot, TimerStatus};

use crate::clock::{self, Clock, ClockError, SystemClock};
use crate::store::{ActivityStore, SessionStore, StoreError};
use crate::types::{Activity, ActivityId, Interval, Session};
use events::Listeners;
use state::{InFlight, TimerState};

/// Timer failures.
#[derive(Debug, Error)]
pub enum TimerError {
    /// A session is already running or paused.
    #[error("a session is already in progress")]
    ActiveSessionExists,

    /// The activity does not exist or is archived.
    #[error("activity {id} does not exist or is archived")]
    InvalidActivity { id: ActivityId },

    /// Pause requested while not running.
    #[error("timer is not running")]
    NotRunning,

    /// Resume requested while not paused.
    #[error("timer is not paused")]
    NotPaused,

    /// Stop requested while idle.
    #[error("no active session")]
    NoActiveSession,

    /// The session log or activity list could not be read or written.
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Clock(#[from] ClockError),
}

impl TimerError {
    /// Stable snake_case code for the UI layer.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::ActiveSessionExists => "active_session_exists",
            Self::InvalidActivity { .. } => "invalid_activity",
            Self::NotRunning => "not_running",
            Self::NotPaused => "not_paused",
            Self::NoActiveSession => "no_active_session",
            Self::Store(_) => "store",
            Self::Clock(_) => "clock",
        }
    }
}

/// Token for the armed one-second ticker. A new token is issued per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickerId(u64);

/// What a call to [`TimerEngine::tick`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// No ticker is armed; nothing happened.
    Inactive,
    /// A `tick` event was emitted.
    Ticked,
    /// The session hit its activity's limit and was stopped.
    AutoStopped(Session),
}

/// Owns the in-flight session and its state machine.
#[derive(Debug)]
pub struct TimerEngine<S, C = SystemClock> {
    store: S,
    clock: C,
    state: TimerState,
    ticker: Option<TickerId>,
    tickers_issued: u64,
    listeners: Listeners,
}

impl<S> TimerEngine<S, SystemClock>
where
    S: ActivityStore + SessionStore,
{
    /// Creates an idle engine reading the wall clock.
    pub fn with_system_clock(store: S) -> Self {
        Self::new(store, SystemClock)
    }
}

impl<S, C> TimerEngine<S, C>
where
    S: ActivityStore + SessionStore,
    C: Clock,
{
    /// Creates an idle engine.
    pub fn new(store: S, clock: C) -> Self {
        Self {
            store,
            clock,
            state: TimerState::Idle,
            ticker: None,
            tickers_issued: 0,
            listeners: Listeners::default(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn status(&self) -> TimerStatus {
        self.state.status()
    }

    /// The armed ticker, if a session is in flight.
    pub const fn ticker(&self) -> Option<TickerId> {
        self.ticker
    }

    /// Registers a listener for every subsequent event.
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&TimerEvent) -> ListenerResult + 'static,
    {
        self.listeners.add(Box::new(listener))
    }

    /// Removes a listener. Returns `false` if it was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.remove(id)
    }

    /// Starts tracking `activity_id`.
    pub fn start_session(&mut self, activity_id: &ActivityId) -> Result<Session, TimerError> {
        if self.state.inflight().is_some() {
            return Err(TimerError::ActiveSessionExists);
        }
        let activity = self
            .store
            .activity(activity_id)?
            .filter(|a| !a.archived)
            .ok_or_else(|| TimerError::InvalidActivity {
                id: activity_id.clone(),
            })?;

        let session = Session::begin(activity.id, self.clock.now_ms());
        self.state = TimerState::Running(InFlight {
            session: session.clone(),
            total_paused_ms: 0,
        });
        self.arm_ticker();
        tracing::debug!(session = %session.id, activity = %session.activity_id, "session started");

        self.emit(|snapshot| TimerEvent::Start { snapshot });
        Ok(session)
    }

    /// Pauses a running session, closing its open interval.
    pub fn pause(&mut self) -> Result<Session, TimerError> {
        let now = self.clock.now_ms();
        let mut inflight = match std::mem::take(&mut self.state) {
            TimerState::Running(inflight) => inflight,
            other => {
                self.state = other;
                return Err(TimerError::NotRunning);
            }
        };
        let now = now.max(inflight.session.latest_instant());
        if let Some(open) = inflight.session.open_interval_mut() {
            open.close(now);
        }
        let session = inflight.session.clone();
        self.state = TimerState::Paused {
            inflight,
            pause_start: now,
        };
        tracing::debug!(session = %session.id, "session paused");

        self.emit(|snapshot| TimerEvent::Pause { snapshot });
        Ok(session)
    }

    /// Resumes a paused session with a fresh interval.
    pub fn resume(&mut self) -> Result<Session, TimerError> {
        let now = self.clock.now_ms();
        let (mut inflight, pause_start) = match std::mem::take(&mut self.state) {
            TimerState::Paused {
                inflight,
                pause_start,
            } => (inflight, pause_start),
            other => {
                self.state = other;
                return Err(TimerError::NotPaused);
            }
        };
        // A clock that stepped back must not reopen before the pause
        let now = now.max(pause_start).max(inflight.session.latest_instant());
        inflight.total_paused_ms += (now - pause_start).max(0);
        inflight.session.intervals.push(Interval::open(now));
        let session = inflight.session.clone();
        self.state = TimerState::Running(inflight);
        tracing::debug!(session = %session.id, "session resumed");

        self.emit(|snapshot| TimerEvent::Resume { snapshot });
        Ok(session)
    }

    /// Completes the in-flight session and appends it to the log.
    pub fn stop(&mut self) -> Result<Session, TimerError> {
        let now = self.clock.now_ms();
        self.finish(now, false)
    }

    /// Discards the in-flight session without saving it.
    pub fn reset(&mut self) -> Option<Session> {
        let discarded = std::mem::take(&mut self.state)
            .inflight()
            .map(|inflight| inflight.session.clone());
        self.cancel_ticker();
        if let Some(session) = &discarded {
            tracing::debug!(session = %session.id, "session discarded");
        }

        self.emit(|snapshot| TimerEvent::Reset {
            snapshot,
            discarded: discarded.clone(),
        });
        discarded
    }

    /// Active seconds of the in-flight session; 0 when idle.
    pub fn elapsed_seconds(&self) -> i64 {
        self.state.elapsed_seconds(self.clock.now_ms())
    }

    /// Detached copy of the current state.
    pub fn snapshot(&self) -> TimerSnapshot {
        self.state.snapshot(self.clock.now_ms())
    }

    /// Evaluates auto-stop and notifies listeners. Call once per second.
    pub fn tick(&mut self) -> Result<TickOutcome, TimerError> {
        if self.ticker.is_none() {
            return Ok(TickOutcome::Inactive);
        }

        if let Some((activity, cap_ms)) = self.auto_stop_due()? {
            let session = self.finish(cap_ms, true)?;
            tracing::info!(
                session = %session.id,
                activity = %activity.id,
                seconds = session.total_duration,
                "session auto-stopped"
            );
            let stopped = session.clone();
            self.emit(|snapshot| TimerEvent::AutoStop {
                snapshot,
                session: stopped,
                activity,
            });
            return Ok(TickOutcome::AutoStopped(session));
        }

        self.emit(|snapshot| TimerEvent::Tick { snapshot });
        Ok(TickOutcome::Ticked)
    }

    /// Seconds tracked for `activity_id` on `date` across saved sessions.
    pub fn daily_total_seconds<Tz: TimeZone>(
        &self,
        activity_id: &ActivityId,
        date: NaiveDate,
        tz: &Tz,
    ) -> Result<i64, TimerError> {
        let sessions = self.store.sessions()?;
        Ok(daily_total_seconds(&sessions, activity_id, date, tz)?)
    }

    /// The activity and the instant its limit was reached, if the running
    /// session is over its `session_max`.
    fn auto_stop_due(&self) -> Result<Option<(Activity, i64)>, TimerError> {
        let TimerState::Running(inflight) = &self.state else {
            return Ok(None);
        };
        let Some(activity) = self.store.activity(&inflight.session.activity_id)? else {
            return Ok(None);
        };
        let Some(cap_seconds) = activity.session_max_seconds() else {
            return Ok(None);
        };

        let now = self.clock.now_ms();
        if self.state.elapsed_seconds(now) < cap_seconds {
            return Ok(None);
        }
        let active_ms = now - inflight.session.session_start - inflight.total_paused_ms;
        let overshoot_ms = (active_ms - cap_seconds * 1000).max(0);
        let open_start = inflight
            .session
            .intervals
            .last()
            .map_or(inflight.session.session_start, |i| i.start);
        let cap_ms = (now - overshoot_ms).max(open_start);
        Ok(Some((activity, cap_ms)))
    }

    /// Closes the in-flight session at `end_ms` and appends it to the log.
    ///
    /// State is only touched after the log write succeeds.
    fn finish(&mut self, end_ms: i64, auto_stopped: bool) -> Result<Session, TimerError> {
        let mut inflight = match &self.state {
            TimerState::Idle => return Err(TimerError::NoActiveSession),
            TimerState::Running(inflight) => inflight.clone(),
            TimerState::Paused {
                inflight,
                pause_start,
            } => {
                let mut inflight = inflight.clone();
                inflight.total_paused_ms += (end_ms - pause_start).max(0);
                inflight
            }
        };
        let end_ms = end_ms.max(inflight.session.latest_instant());
        if let Some(open) = inflight.session.open_interval_mut() {
            open.close(end_ms);
        }
        let mut session = inflight.session;
        session.session_end = Some(end_ms);
        session.total_duration = session.interval_seconds();
        session.auto_stopped = auto_stopped;

        let mut log = self.store.sessions()?;
        log.push(session.clone());
        self.store.save_sessions(&log)?;

        self.state = TimerState::Idle;
        self.cancel_ticker();
        tracing::info!(
            session = %session.id,
            activity = %session.activity_id,
            seconds = session.total_duration,
            intervals = session.intervals.len(),
            "session saved"
        );

        let saved = session.clone();
        self.emit(|snapshot| TimerEvent::Stop {
            snapshot,
            session: saved,
            auto_stopped,
        });
        Ok(session)
    }

    fn arm_ticker(&mut self) {
        self.tickers_issued += 1;
        let ticker = TickerId(self.tickers_issued);
        if let Some(previous) = self.ticker.replace(ticker) {
            tracing::warn!(?previous, "replaced a ticker that was still armed");
        }
        tracing::debug!(?ticker, "ticker armed");
    }

    fn cancel_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            tracing::debug!(?ticker, "ticker cancelled");
        }
    }

    fn emit(&mut self, build: impl FnOnce(TimerSnapshot) -> TimerEvent) {
        let event = build(self.snapshot());
        self.listeners.dispatch(&event);
    }
}

/// Seconds tracked for `activity_id` in sessions starting on `date` (local to `tz`).
pub fn daily_total_seconds<Tz: TimeZone>(
    sessions: &[Session],
    activity_id: &ActivityId,
    date: NaiveDate,
    tz: &Tz,
) -> Result<i64, ClockError> {
    let mut total = 0;
    for session in sessions.iter().filter(|s| &s.activity_id == activity_id) {
        if clock::local_date(tz, session.session_start)? == date {
            total += session.tracked_seconds();
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use chrono::Utc;

    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;
    use crate::types::{Category, CognitiveLoad, Priority};

    // 2024-07-15T09:00:00Z
    const T0: i64 = 1_721_034_000_000;

    fn activity(id: &str, session_max: Option<u32>) -> Activity {
        Activity {
            id: ActivityId::new(id).unwrap(),
            label: id.to_uppercase(),
            category: Category::Professional,
            priority: Priority::Medium,
            cognitive_load: CognitiveLoad::Moderate,
            daily_max: None,
            session_max,
            archived: false,
        }
    }

    fn id(value: &str) -> ActivityId {
        ActivityId::new(value).unwrap()
    }

    fn engine_with(activities: Vec<Activity>) -> (TimerEngine<MemoryStore, ManualClock>, ManualClock) {
        let clock = ManualClock::new(T0);
        let engine = TimerEngine::new(MemoryStore::with_activities(activities), clock.clone());
        (engine, clock)
    }

    fn record_events(engine: &mut TimerEngine<MemoryStore, ManualClock>) -> Rc<RefCell<Vec<&'static str>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        engine.subscribe(move |event| {
            sink.borrow_mut().push(event.name());
            Ok(())
        });
        seen
    }

    fn assert_intervals_well_formed(session: &Session) {
        for pair in session.intervals.windows(2) {
            let end = pair[0].end.expect("earlier interval closed");
            assert!(pair[0].start <= end);
            assert!(end <= pair[1].start, "intervals overlap: {pair:?}");
        }
        let sum = session.interval_seconds();
        assert!((sum - session.total_duration).abs() <= 1);
    }

    #[test]
    fn start_pause_resume_stop_keeps_ledger_consistent() {
        let (mut engine, clock) = engine_with(vec![activity("a", None)]);
        engine.start_session(&id("a")).unwrap();

        for _ in 0..3 {
            clock.advance_ms(61_700);
            engine.pause().unwrap();
            clock.advance_secs(30);
            engine.resume().unwrap();
        }
        clock.advance_ms(10_400);
        let session = engine.stop().unwrap();

        assert_eq!(session.intervals.len(), 4);
        assert!(session.intervals.iter().all(|i| !i.is_open()));
        assert_intervals_well_formed(&session);
        assert_eq!(session.total_duration, 3 * 62 + 10);
        assert_eq!(session.session_end, Some(clock.now_ms()));
        assert!(!session.auto_stopped);
        assert_eq!(engine.status(), TimerStatus::Idle);
        assert_eq!(engine.store().sessions.len(), 1);
    }

    #[test]
    fn elapsed_grows_while_running_and_freezes_while_paused() {
        let (mut engine, clock) = engine_with(vec![activity("a", None)]);
        assert_eq!(engine.elapsed_seconds(), 0);
        engine.start_session(&id("a")).unwrap();

        let mut last = 0;
        for _ in 0..5 {
            clock.advance_ms(700);
            let now = engine.elapsed_seconds();
            assert!(now >= last);
            last = now;
        }
        assert_eq!(last, 3);

        engine.pause().unwrap();
        clock.advance_secs(120);
        assert_eq!(engine.elapsed_seconds(), 3);

        engine.resume().unwrap();
        clock.advance_secs(2);
        assert_eq!(engine.elapsed_seconds(), 5);

        engine.stop().unwrap();
        assert_eq!(engine.elapsed_seconds(), 0);

        engine.start_session(&id("a")).unwrap();
        clock.advance_secs(9);
        engine.reset();
        assert_eq!(engine.elapsed_seconds(), 0);
    }

    #[test]
    fn second_start_is_rejected_without_side_effects() {
        let (mut engine, clock) = engine_with(vec![activity("a", None), activity("b", None)]);
        engine.start_session(&id("a")).unwrap();
        clock.advance_secs(5);
        engine.pause().unwrap();
        let before = engine.snapshot();

        let err = engine.start_session(&id("b")).unwrap_err();
        assert!(matches!(err, TimerError::ActiveSessionExists));
        assert_eq!(err.code(), "active_session_exists");
        assert_eq!(engine.snapshot(), before);
    }

    #[test]
    fn unknown_or_archived_activity_is_invalid() {
        let mut archived = activity("old", None);
        archived.archived = true;
        let (mut engine, _clock) = engine_with(vec![archived]);

        let err = engine.start_session(&id("old")).unwrap_err();
        assert!(matches!(err, TimerError::InvalidActivity { .. }));
        let err = engine.start_session(&id("missing")).unwrap_err();
        assert_eq!(err.code(), "invalid_activity");
        assert_eq!(engine.status(), TimerStatus::Idle);
        assert!(engine.ticker().is_none());
    }

    #[test]
    fn transitions_in_wrong_state_fail_and_preserve_state() {
        let (mut engine, clock) = engine_with(vec![activity("a", None)]);
        assert!(matches!(engine.pause(), Err(TimerError::NotRunning)));
        assert!(matches!(engine.resume(), Err(TimerError::NotPaused)));
        assert!(matches!(engine.stop(), Err(TimerError::NoActiveSession)));

        engine.start_session(&id("a")).unwrap();
        clock.advance_secs(3);
        assert!(matches!(engine.resume(), Err(TimerError::NotPaused)));
        assert_eq!(engine.status(), TimerStatus::Running);

        engine.pause().unwrap();
        let paused = engine.snapshot();
        assert!(matches!(engine.pause(), Err(TimerError::NotRunning)));
        assert_eq!(engine.snapshot(), paused);
    }

    #[test]
    fn stop_while_paused_folds_pending_pause() {
        let (mut engine, clock) = engine_with(vec![activity("a", None)]);
        engine.start_session(&id("a")).unwrap();
        clock.advance_secs(40);
        engine.pause().unwrap();
        clock.advance_secs(300);
        let session = engine.stop().unwrap();

        assert_eq!(session.intervals.len(), 1);
        assert_eq!(session.total_duration, 40);
        assert_eq!(session.session_end, Some(T0 + 340_000));
        assert_intervals_well_formed(&session);
    }

    #[test]
    fn stop_appends_without_touching_prior_sessions() {
        let (mut engine, clock) = engine_with(vec![activity("a", None)]);
        engine.start_session(&id("a")).unwrap();
        clock.advance_secs(10);
        let first = engine.stop().unwrap();

        engine.start_session(&id("a")).unwrap();
        clock.advance_secs(20);
        let second = engine.stop().unwrap();

        assert_eq!(engine.store().sessions, vec![first, second]);
    }

    #[test]
    fn auto_stop_fires_once_at_session_max() {
        let (mut engine, clock) = engine_with(vec![activity("a", Some(1))]);
        let events = record_events(&mut engine);
        engine.start_session(&id("a")).unwrap();

        let mut auto_stops = Vec::new();
        for _ in 0..90 {
            clock.advance_secs(1);
            if let TickOutcome::AutoStopped(session) = engine.tick().unwrap() {
                auto_stops.push((engine.store().sessions.len(), session));
            }
        }

        assert_eq!(auto_stops.len(), 1);
        let (saved, session) = &auto_stops[0];
        assert_eq!(*saved, 1);
        assert!(session.auto_stopped);
        assert_eq!(session.total_duration, 60);
        assert_eq!(engine.tick().unwrap(), TickOutcome::Inactive);

        let events = events.borrow();
        let ticks = events.iter().filter(|e| **e == "tick").count();
        assert_eq!(ticks, 59);
        assert_eq!(events.iter().filter(|e| **e == "auto-stop").count(), 1);
        assert_eq!(&events[events.len() - 2..], &["stop", "auto-stop"]);
    }

    #[test]
    fn auto_stop_after_long_gap_ends_at_the_limit() {
        let (mut engine, clock) = engine_with(vec![activity("a", Some(25))]);
        engine.start_session(&id("a")).unwrap();
        clock.advance_secs(26 * 60);

        let TickOutcome::AutoStopped(session) = engine.tick().unwrap() else {
            panic!("expected auto-stop");
        };
        assert!(session.auto_stopped);
        assert_eq!(session.total_duration, 1500);
        assert_eq!(session.session_end, Some(T0 + 1_500_000));
        assert_eq!(engine.status(), TimerStatus::Idle);
    }

    #[test]
    fn paused_sessions_never_auto_stop() {
        let (mut engine, clock) = engine_with(vec![activity("a", Some(1))]);
        engine.start_session(&id("a")).unwrap();
        clock.advance_secs(30);
        engine.pause().unwrap();
        clock.advance_secs(3600);
        assert_eq!(engine.tick().unwrap(), TickOutcome::Ticked);
        assert_eq!(engine.status(), TimerStatus::Paused);

        engine.resume().unwrap();
        clock.advance_secs(30);
        let TickOutcome::AutoStopped(session) = engine.tick().unwrap() else {
            panic!("expected auto-stop");
        };
        assert_eq!(session.total_duration, 60);
        assert_eq!(session.intervals.len(), 2);
    }

    #[test]
    fn reset_discards_without_persisting() {
        let (mut engine, clock) = engine_with(vec![activity("a", None)]);
        let events = record_events(&mut engine);
        engine.start_session(&id("a")).unwrap();
        clock.advance_secs(15);

        let discarded = engine.reset().expect("session was in flight");
        assert_eq!(discarded.activity_id, id("a"));
        assert!(engine.store().sessions.is_empty());
        assert_eq!(engine.status(), TimerStatus::Idle);
        assert_eq!(engine.tick().unwrap(), TickOutcome::Inactive);
        assert_eq!(*events.borrow(), vec!["start", "reset"]);
    }

    #[test]
    fn each_session_gets_a_fresh_ticker() {
        let (mut engine, _clock) = engine_with(vec![activity("a", None)]);
        engine.start_session(&id("a")).unwrap();
        let first = engine.ticker().unwrap();
        engine.stop().unwrap();
        assert!(engine.ticker().is_none());

        engine.start_session(&id("a")).unwrap();
        let second = engine.ticker().unwrap();
        assert_ne!(first, second);
        engine.reset();
        assert!(engine.ticker().is_none());
    }

    #[test]
    fn failing_listener_does_not_break_others_or_state() {
        let (mut engine, clock) = engine_with(vec![activity("a", None)]);
        engine.subscribe(|_| Err("listener failure".into()));
        engine.subscribe(|event| {
            if event.name() == "tick" {
                panic!("listener bug");
            }
            Ok(())
        });
        let events = record_events(&mut engine);

        engine.start_session(&id("a")).unwrap();
        clock.advance_secs(1);
        assert_eq!(engine.tick().unwrap(), TickOutcome::Ticked);
        clock.advance_secs(1);
        engine.stop().unwrap();

        assert_eq!(*events.borrow(), vec!["start", "tick", "stop"]);
        assert_eq!(engine.store().sessions.len(), 1);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let (mut engine, _clock) = engine_with(vec![activity("a", None)]);
        let seen = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&seen);
        let subscription = engine.subscribe(move |_| {
            *sink.borrow_mut() += 1;
            Ok(())
        });
        engine.start_session(&id("a")).unwrap();
        assert!(engine.unsubscribe(subscription));
        engine.stop().unwrap();
        assert_eq!(*seen.borrow(), 1);
    }

    #[test]
    fn events_carry_snapshots() {
        let (mut engine, clock) = engine_with(vec![activity("a", None)]);
        let snapshots = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&snapshots);
        engine.subscribe(move |event| {
            sink.borrow_mut().push(event.snapshot().clone());
            Ok(())
        });

        engine.start_session(&id("a")).unwrap();
        clock.advance_secs(7);
        engine.pause().unwrap();
        engine.stop().unwrap();

        let snapshots = snapshots.borrow();
        assert_eq!(snapshots[0].status, TimerStatus::Running);
        assert_eq!(snapshots[1].status, TimerStatus::Paused);
        assert_eq!(snapshots[1].elapsed_seconds, 7);
        assert_eq!(snapshots[2].status, TimerStatus::Idle);
        assert!(snapshots[2].current_session.is_none());
    }

    #[test]
    fn failed_save_keeps_session_in_flight() {
        let (mut engine, clock) = engine_with(vec![activity("a", None)]);
        engine.start_session(&id("a")).unwrap();
        clock.advance_secs(12);
        let before = engine.snapshot();

        engine.store.fail_writes = true;
        let err = engine.stop().unwrap_err();
        assert_eq!(err.code(), "store");
        assert_eq!(engine.snapshot(), before);
        assert!(engine.ticker().is_some());

        engine.store.fail_writes = false;
        let session = engine.stop().unwrap();
        assert_eq!(session.total_duration, 12);
    }

    #[test]
    fn daily_total_only_counts_matching_activity_and_day() {
        let (mut engine, clock) = engine_with(vec![activity("a", None), activity("b", None)]);
        for (activity_id, secs) in [("a", 600), ("b", 300), ("a", 900)] {
            engine.start_session(&id(activity_id)).unwrap();
            clock.advance_secs(secs);
            engine.stop().unwrap();
        }
        clock.advance_secs(86_400);
        engine.start_session(&id("a")).unwrap();
        clock.advance_secs(100);
        engine.stop().unwrap();

        let day = clock::local_date(&Utc, T0).unwrap();
        assert_eq!(engine.daily_total_seconds(&id("a"), day, &Utc).unwrap(), 1500);
        assert_eq!(engine.daily_total_seconds(&id("b"), day, &Utc).unwrap(), 300);
        let next = day.succ_opt().unwrap();
        assert_eq!(engine.daily_total_seconds(&id("a"), next, &Utc).unwrap(), 100);
    }

    #[test]
    fn clock_stepping_back_never_overlaps_intervals() {
        let (mut engine, clock) = engine_with(vec![activity("a", None)]);
        engine.start_session(&id("a")).unwrap();
        clock.advance_secs(600);
        engine.pause().unwrap();

        // Wall clock jumps back before the pause
        clock.set(T0 + 300_000);
        let resumed = engine.resume().unwrap();
        assert_eq!(resumed.intervals[1].start, T0 + 600_000);

        clock.set(T0 + 200_000);
        let session = engine.stop().unwrap();
        assert_intervals_well_formed(&session);
        assert_eq!(session.session_end, Some(T0 + 600_000));
        assert_eq!(session.total_duration, 600);

        let bundle = crate::bundle::export_bundle(engine.store()).unwrap();
        bundle.validate().unwrap();
    }

    #[test]
    fn pause_before_session_start_closes_at_start() {
        let (mut engine, clock) = engine_with(vec![activity("a", None)]);
        engine.start_session(&id("a")).unwrap();
        clock.set(T0 - 60_000);
        let paused = engine.pause().unwrap();
        assert_eq!(paused.intervals[0].end, Some(T0));
        assert_eq!(paused.intervals[0].duration, 0);
    }
}
