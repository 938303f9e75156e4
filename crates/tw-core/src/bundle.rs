//! Whole-state import and export.
//!
//! A bundle is the JSON document `{activities, logs, userConfig}`. Older
//! exports call the session log `sessions`; both names are accepted. Every
//! check runs before anything is written, so a bad payload is never partially
//! applied.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::round_ms_to_seconds;
use crate::store::{ActivityStore, ConfigStore, SessionStore, StoreError};
use crate::types::{Activity, ActivityId, ConfigError, Session, SessionId, UserConfig};

/// Allowed rounding drift for recorded durations.
const DURATION_TOLERANCE_SECONDS: i64 = 1;

/// Integrity violations found while reading or checking a bundle.
#[derive(Debug, Error)]
pub enum BundleError {
    /// The payload is not a bundle (wrong JSON shape or field types).
    #[error("invalid bundle: {0}")]
    Schema(#[from] serde_json::Error),

    #[error("duplicate activity id {0}")]
    DuplicateActivity(ActivityId),

    #[error("activity {0} has an empty label")]
    EmptyLabel(ActivityId),

    #[error("duplicate session id {0}")]
    DuplicateSession(SessionId),

    #[error("session {0} has no end")]
    OpenSession(SessionId),

    #[error("session {0} ends before it starts")]
    InvertedSession(SessionId),

    #[error("session {0} has no intervals")]
    NoIntervals(SessionId),

    #[error("session {session} interval {index} has no end")]
    OpenInterval { session: SessionId, index: usize },

    #[error("session {session} interval {index} ends before it starts")]
    InvertedInterval { session: SessionId, index: usize },

    #[error("session {session} interval {index} lies outside the session")]
    IntervalOutsideSession { session: SessionId, index: usize },

    #[error("session {session} interval {index} overlaps or precedes the previous one")]
    OverlappingIntervals { session: SessionId, index: usize },

    #[error("session {session} interval {index} duration {recorded}s does not match {expected}s")]
    IntervalDuration {
        session: SessionId,
        index: usize,
        recorded: i64,
        expected: i64,
    },

    #[error("session {session} total {recorded}s does not match interval sum {expected}s")]
    TotalMismatch {
        session: SessionId,
        recorded: i64,
        expected: i64,
    },

    #[error("session {session} timestamp {value} is out of range")]
    TimestampOutOfRange { session: SessionId, value: i64 },

    #[error("invalid user config: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Everything the tracker persists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    #[serde(default)]
    pub activities: Vec<Activity>,
    #[serde(default, alias = "sessions")]
    pub logs: Vec<Session>,
    #[serde(default)]
    pub user_config: UserConfig,
}

/// Counts of what an import replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub activities: usize,
    pub sessions: usize,
}

impl Bundle {
    /// Parses a bundle from JSON text. Only the shape is checked here.
    pub fn from_json(text: &str) -> Result<Self, BundleError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Checks the whole payload, stopping at the first violation.
    pub fn validate(&self) -> Result<(), BundleError> {
        let mut activity_ids = HashSet::new();
        for activity in &self.activities {
            if !activity_ids.insert(&activity.id) {
                return Err(BundleError::DuplicateActivity(activity.id.clone()));
            }
            if activity.label.trim().is_empty() {
                return Err(BundleError::EmptyLabel(activity.id.clone()));
            }
        }

        let mut session_ids = HashSet::new();
        for session in &self.logs {
            if !session_ids.insert(&session.id) {
                return Err(BundleError::DuplicateSession(session.id.clone()));
            }
            validate_session(session)?;
        }

        self.user_config.validate()?;
        Ok(())
    }

    #[must_use]
    pub fn summary(&self) -> ImportSummary {
        ImportSummary {
            activities: self.activities.len(),
            sessions: self.logs.len(),
        }
    }
}

fn validate_session(session: &Session) -> Result<(), BundleError> {
    let id = || session.id.clone();
    let check_ts = |value: i64| {
        DateTime::<Utc>::from_timestamp_millis(value)
            .map(|_| ())
            .ok_or_else(|| BundleError::TimestampOutOfRange {
                session: id(),
                value,
            })
    };

    check_ts(session.session_start)?;
    let end = session.session_end.ok_or_else(|| BundleError::OpenSession(id()))?;
    check_ts(end)?;
    if end < session.session_start {
        return Err(BundleError::InvertedSession(id()));
    }
    if session.intervals.is_empty() {
        return Err(BundleError::NoIntervals(id()));
    }

    let mut previous_end: Option<i64> = None;
    for (index, interval) in session.intervals.iter().enumerate() {
        let interval_end = interval
            .end
            .ok_or_else(|| BundleError::OpenInterval { session: id(), index })?;
        if interval_end < interval.start {
            return Err(BundleError::InvertedInterval { session: id(), index });
        }
        if interval.start < session.session_start || interval_end > end {
            return Err(BundleError::IntervalOutsideSession { session: id(), index });
        }
        if previous_end.is_some_and(|prev| interval.start < prev) {
            return Err(BundleError::OverlappingIntervals { session: id(), index });
        }
        let expected = round_ms_to_seconds(interval_end - interval.start);
        if (interval.duration - expected).abs() > DURATION_TOLERANCE_SECONDS {
            return Err(BundleError::IntervalDuration {
                session: id(),
                index,
                recorded: interval.duration,
                expected,
            });
        }
        previous_end = Some(interval_end);
    }

    let expected = session.interval_seconds();
    if (session.total_duration - expected).abs() > DURATION_TOLERANCE_SECONDS {
        return Err(BundleError::TotalMismatch {
            session: id(),
            recorded: session.total_duration,
            expected,
        });
    }
    Ok(())
}

/// Snapshot of every stored collection.
pub fn export_bundle<S>(store: &S) -> Result<Bundle, StoreError>
where
    S: ActivityStore + SessionStore + ConfigStore,
{
    Ok(Bundle {
        activities: store.activities()?,
        logs: store.sessions()?,
        user_config: store.user_config()?,
    })
}

/// Validates `bundle`, then replaces all three collections with it.
///
/// Backends that can group the writes atomically should do so themselves;
/// this generic version writes collection by collection.
pub fn import_bundle<S>(store: &mut S, bundle: &Bundle) -> Result<ImportSummary, BundleError>
where
    S: ActivityStore + SessionStore + ConfigStore,
{
    bundle.validate()?;
    store.save_activities(&bundle.activities)?;
    store.save_sessions(&bundle.logs)?;
    store.save_user_config(&bundle.user_config)?;
    let summary = bundle.summary();
    tracing::info!(
        activities = summary.activities,
        sessions = summary.sessions,
        "bundle imported"
    );
    Ok(summary)
}
