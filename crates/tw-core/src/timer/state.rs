use serde::{Deserialize, Serialize};

use crate::types::Session;

/// Resting states of the timer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    #[default]
    Idle,
    Running,
    Paused,
}

impl TimerStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
        }
    }
}

/// Bookkeeping for the session currently being tracked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct InFlight {
    pub session: Session,
    /// Pause time already folded in by `resume`.
    pub total_paused_ms: i64,
}

/// The timer state machine. Exactly one variant holds the in-flight session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) enum TimerState {
    #[default]
    Idle,
    Running(InFlight),
    Paused { inflight: InFlight, pause_start: i64 },
}

impl TimerState {
    pub const fn status(&self) -> TimerStatus {
        match self {
            Self::Idle => TimerStatus::Idle,
            Self::Running(_) => TimerStatus::Running,
            Self::Paused { .. } => TimerStatus::Paused,
        }
    }

    pub const fn inflight(&self) -> Option<&InFlight> {
        match self {
            Self::Idle => None,
            Self::Running(inflight) | Self::Paused { inflight, .. } => Some(inflight),
        }
    }

    pub const fn pause_start(&self) -> Option<i64> {
        match self {
            Self::Paused { pause_start, .. } => Some(*pause_start),
            _ => None,
        }
    }

    /// Whole seconds of active time at `now_ms`; 0 when idle, never negative.
    pub fn elapsed_seconds(&self, now_ms: i64) -> i64 {
        let Some(inflight) = self.inflight() else {
            return 0;
        };
        let pending_pause = self.pause_start().map_or(0, |start| now_ms - start);
        let active_ms =
            now_ms - inflight.session.session_start - inflight.total_paused_ms - pending_pause;
        active_ms.max(0) / 1000
    }

    pub fn snapshot(&self, now_ms: i64) -> TimerSnapshot {
        TimerSnapshot {
            status: self.status(),
            current_session: self.inflight().map(|i| i.session.clone()),
            is_paused: matches!(self, Self::Paused { .. }),
            pause_start: self.pause_start(),
            total_paused_ms: self.inflight().map_or(0, |i| i.total_paused_ms),
            elapsed_seconds: self.elapsed_seconds(now_ms),
        }
    }
}

/// Detached copy of the timer state, safe to hand to listeners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub status: TimerStatus,
    pub current_session: Option<Session>,
    pub is_paused: bool,
    pub pause_start: Option<i64>,
    pub total_paused_ms: i64,
    pub elapsed_seconds: i64,
}
