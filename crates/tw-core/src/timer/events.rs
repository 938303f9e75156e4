//! Timer notifications and the listener registry.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use serde::Serialize;

use super::state::TimerSnapshot;
use crate::types::{Activity, Session};

/// Something that happened to the timer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum TimerEvent {
    Start {
        snapshot: TimerSnapshot,
    },
    Pause {
        snapshot: TimerSnapshot,
    },
    Resume {
        snapshot: TimerSnapshot,
    },
    /// A session was completed and appended to the log.
    Stop {
        snapshot: TimerSnapshot,
        session: Session,
        auto_stopped: bool,
    },
    /// The in-flight session was discarded without being saved.
    Reset {
        snapshot: TimerSnapshot,
        discarded: Option<Session>,
    },
    Tick {
        snapshot: TimerSnapshot,
    },
    /// The activity's per-session limit was reached. Follows the `Stop` event.
    AutoStop {
        snapshot: TimerSnapshot,
        session: Session,
        activity: Activity,
    },
}

impl TimerEvent {
    /// Wire name of the event (`start`, `auto-stop`, ...).
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::Pause { .. } => "pause",
            Self::Resume { .. } => "resume",
            Self::Stop { .. } => "stop",
            Self::Reset { .. } => "reset",
            Self::Tick { .. } => "tick",
            Self::AutoStop { .. } => "auto-stop",
        }
    }

    /// Timer state right after the event.
    #[must_use]
    pub const fn snapshot(&self) -> &TimerSnapshot {
        match self {
            Self::Start { snapshot }
            | Self::Pause { snapshot }
            | Self::Resume { snapshot }
            | Self::Stop { snapshot, .. }
            | Self::Reset { snapshot, .. }
            | Self::Tick { snapshot }
            | Self::AutoStop { snapshot, .. } => snapshot,
        }
    }
}

/// Error a listener may report. It is logged and otherwise ignored.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Return type of a timer listener.
pub type ListenerResult = Result<(), ListenerError>;

type Listener = Box<dyn FnMut(&TimerEvent) -> ListenerResult>;

/// Handle returned by `subscribe`; pass it to `unsubscribe` to stop delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Ordered listener list. Delivery follows subscription order.
#[derive(Default)]
pub(crate) struct Listeners {
    next_id: u64,
    entries: Vec<(SubscriptionId, Listener)>,
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.entries.len())
            .finish()
    }
}

impl Listeners {
    pub fn add(&mut self, listener: Listener) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.entries.push((id, listener));
        id
    }

    pub fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    /// Delivers `event` to every listener. A listener that errors or panics
    /// is logged and skipped; the rest still run.
    pub fn dispatch(&mut self, event: &TimerEvent) {
        for (id, listener) in &mut self.entries {
            match panic::catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(Ok(())) => {}
                Ok(Err(error)) => tracing::warn!(
                    subscription = id.0,
                    event = event.name(),
                    %error,
                    "timer listener failed"
                ),
                Err(_) => tracing::error!(
                    subscription = id.0,
                    event = event.name(),
                    "timer listener panicked"
                ),
            }
        }
    }
}
