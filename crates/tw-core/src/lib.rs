//! Core domain logic for the TimeWise tracker.
//!
//! This crate contains the fundamental types and logic for:
//! - Timer: the single in-flight session and its pause/resume/auto-stop rules
//! - Stats: bucketed daily/weekly/monthly summaries with target-capped inactivity
//! - History and bundles: session listings and whole-state import/export
//! - Planner: day structure and whether budgeted work fits the day
//!
//! Storage is abstracted behind the traits in [`store`]; nothing here touches
//! the filesystem or the system clock directly.

pub mod bundle;
pub mod clock;
pub mod history;
pub mod inactivity;
pub mod planner;
pub mod stats;
pub mod store;
pub mod timer;
pub mod types;

pub use bundle::{Bundle, BundleError, ImportSummary, export_bundle, import_bundle};
pub use clock::{Clock, ClockError, ManualClock, SystemClock};
pub use history::{HistoryEntry, history};
pub use planner::{DayPlan, DayStructure, Feasibility, LoadDistribution, PlannedActivity, plan_day};
pub use stats::{ActivityRow, StatsEngine, StatsError, StatsReport, StatsUnit};
pub use store::{ActivityStore, ConfigStore, MemoryStore, SessionStore, StoreError};
pub use timer::{
    SubscriptionId, TickOutcome, TickerId, TimerEngine, TimerError, TimerEvent, TimerSnapshot,
    TimerStatus,
};
pub use types::{
    Activity, ActivityId, Category, CognitiveLoad, ConfigError, DailyWorkTargets, Interval, Period,
    Priority, Session, SessionId, TimeOfDay, UserConfig, ValidationError, WeekStart, Weekly,
};
