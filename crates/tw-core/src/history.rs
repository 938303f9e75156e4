//! Flat, newest-first listing of completed sessions.

use std::collections::HashMap;

use chrono::TimeZone;
use serde::Serialize;

use crate::clock::{self, ClockError};
use crate::stats::UNKNOWN_ACTIVITY_LABEL;
use crate::types::{Activity, ActivityId, Category, Priority, Session, SessionId};

/// One completed session with its activity metadata resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub session_id: SessionId,
    pub activity_id: ActivityId,
    pub label: String,
    pub category: Category,
    pub priority: Priority,
    pub session_start: i64,
    pub session_end: Option<i64>,
    pub total_duration: i64,
    /// `HH:MM:SS`.
    pub duration_text: String,
    /// Local `YYYY-MM-DD` of the start.
    pub date: String,
    /// Local `HH:MM` of the start.
    pub start_time: String,
    /// Local `HH:MM` of the end, if the session has one.
    pub end_time: Option<String>,
    pub auto_stopped: bool,
}

/// Lists `sessions` newest first. Sessions whose activity is gone are shown
/// as "Unknown", personal, medium priority.
pub fn history<Tz: TimeZone>(
    activities: &[Activity],
    sessions: &[Session],
    tz: &Tz,
) -> Result<Vec<HistoryEntry>, ClockError> {
    let by_id: HashMap<&ActivityId, &Activity> = activities.iter().map(|a| (&a.id, a)).collect();

    let mut ordered: Vec<&Session> = sessions.iter().collect();
    ordered.sort_by(|a, b| {
        b.session_start
            .cmp(&a.session_start)
            .then_with(|| a.id.cmp(&b.id))
    });

    ordered
        .into_iter()
        .map(|session| -> Result<HistoryEntry, ClockError> {
            let activity = by_id.get(&session.activity_id).copied();
            let time_of = |ts| clock::time_of_day_minutes(tz, ts).map(clock::format_time_of_day);
            Ok(HistoryEntry {
                session_id: session.id.clone(),
                activity_id: session.activity_id.clone(),
                label: activity
                    .map_or_else(|| UNKNOWN_ACTIVITY_LABEL.to_string(), |a| a.label.clone()),
                category: activity.map_or(Category::Personal, |a| a.category),
                priority: activity.map_or(Priority::Medium, |a| a.priority),
                session_start: session.session_start,
                session_end: session.session_end,
                total_duration: session.tracked_seconds(),
                duration_text: clock::format_hms(session.tracked_seconds()),
                date: clock::date_key(tz, session.session_start)?,
                start_time: time_of(session.session_start)?,
                end_time: session.session_end.map(time_of).transpose()?,
                auto_stopped: session.auto_stopped,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, Utc};

    use super::*;
    use crate::types::{CognitiveLoad, Interval};

    // 2024-07-15T09:00:00Z
    const T0: i64 = 1_721_034_000_000;

    fn completed(id: &str, activity_id: &str, start: i64, seconds: i64) -> Session {
        let end = start + seconds * 1000;
        Session {
            id: SessionId::new(id).unwrap(),
            activity_id: ActivityId::new(activity_id).unwrap(),
            session_start: start,
            session_end: Some(end),
            intervals: vec![Interval {
                start,
                end: Some(end),
                duration: seconds,
            }],
            total_duration: seconds,
            auto_stopped: false,
        }
    }

    fn writing() -> Activity {
        Activity {
            id: ActivityId::new("w").unwrap(),
            label: "Writing".to_string(),
            category: Category::Professional,
            priority: Priority::High,
            cognitive_load: CognitiveLoad::Intense,
            daily_max: None,
            session_max: None,
            archived: false,
        }
    }

    #[test]
    fn newest_first_with_unknown_fallback() {
        let sessions = vec![
            completed("s1", "w", T0, 3725),
            completed("s2", "deleted", T0 + 7_200_000, 60),
        ];
        let entries = history(&[writing()], &sessions, &Utc).unwrap();

        assert_eq!(entries[0].session_id.as_str(), "s2");
        assert_eq!(entries[0].label, "Unknown");
        assert_eq!(entries[0].category, Category::Personal);
        assert_eq!(entries[0].priority, Priority::Medium);

        let first = &entries[1];
        assert_eq!(first.label, "Writing");
        assert_eq!(first.duration_text, "01:02:05");
        assert_eq!(first.start_time, "09:00");
        assert_eq!(first.end_time.as_deref(), Some("10:02"));
        assert_eq!(first.date, "2024-07-15");
    }

    #[test]
    fn times_are_local_to_the_zone() {
        let sessions = vec![completed("s1", "w", T0, 60)];
        let minus_five = FixedOffset::west_opt(5 * 3600).unwrap();
        let entries = history(&[writing()], &sessions, &minus_five).unwrap();
        assert_eq!(entries[0].start_time, "04:00");
        assert_eq!(entries[0].end_time.as_deref(), Some("04:01"));
    }

    #[test]
    fn empty_log_is_empty() {
        assert!(history(&[], &[], &Utc).unwrap().is_empty());
    }
}
