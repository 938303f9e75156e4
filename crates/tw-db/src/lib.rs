//! Storage layer for the TimeWise tracker.
//!
//! Implements the `tw-core` repository traits on top of `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! One process is expected to be the only writer; nothing here coordinates
//! concurrent writers.
//!
//! # Schema
//!
//! Timestamps are epoch milliseconds stored as INTEGER, the same values the
//! core types carry. Collections are read and written whole, so both tables
//! keep a `position` column that preserves the order they were saved in.
//!
//! A session's intervals are stored as a JSON array in the `intervals` column,
//! using the same camelCase shape as exported bundles. User preferences live
//! in `settings` under the `user_config` key.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;
use tw_core::store::{ActivityStore, ConfigStore, SessionStore, StoreError};
use tw_core::types::{Activity, ActivityId, Interval, Session, SessionId, UserConfig};
use tw_core::{Bundle, BundleError, ImportSummary, ValidationError};

const USER_CONFIG_KEY: &str = "user_config";

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A JSON column could not be encoded or decoded.
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    /// A stored row holds a value the core types reject.
    #[error("invalid {table} row {id}: {source}")]
    InvalidRow {
        table: &'static str,
        id: String,
        #[source]
        source: ValidationError,
    },
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        Self::backend("sqlite backend failed", err)
    }
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
#[derive(Debug)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        tracing::debug!(path = %path.display(), "database opened");
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS activities (
                id TEXT PRIMARY KEY,
                position INTEGER NOT NULL,
                label TEXT NOT NULL,
                category TEXT NOT NULL,
                priority TEXT NOT NULL,
                cognitive_load TEXT NOT NULL,
                daily_max INTEGER,
                session_max INTEGER,
                archived INTEGER NOT NULL DEFAULT 0
            );

            -- Sessions may outlive the activity they reference, so there is
            -- no foreign key on activity_id.
            -- intervals: JSON array of {start, end, duration}
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                position INTEGER NOT NULL,
                activity_id TEXT NOT NULL,
                session_start INTEGER NOT NULL,
                session_end INTEGER,
                intervals TEXT NOT NULL,
                total_duration INTEGER NOT NULL DEFAULT 0,
                auto_stopped INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_start ON sessions(session_start);
            CREATE INDEX IF NOT EXISTS idx_sessions_activity ON sessions(activity_id);

            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    /// Lists activities in saved order.
    pub fn list_activities(&self) -> Result<Vec<Activity>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, label, category, priority, cognitive_load, daily_max, session_max, archived
            FROM activities
            ORDER BY position ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ActivityRow {
                id: row.get(0)?,
                label: row.get(1)?,
                category: row.get(2)?,
                priority: row.get(3)?,
                cognitive_load: row.get(4)?,
                daily_max: row.get(5)?,
                session_max: row.get(6)?,
                archived: row.get(7)?,
            })
        })?;
        let mut activities = Vec::new();
        for row in rows {
            activities.push(row?.into_activity()?);
        }
        Ok(activities)
    }

    /// Lists sessions in saved order.
    pub fn list_sessions(&self) -> Result<Vec<Session>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, activity_id, session_start, session_end, intervals, total_duration, auto_stopped
            FROM sessions
            ORDER BY position ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SessionRow {
                id: row.get(0)?,
                activity_id: row.get(1)?,
                session_start: row.get(2)?,
                session_end: row.get(3)?,
                intervals: row.get(4)?,
                total_duration: row.get(5)?,
                auto_stopped: row.get(6)?,
            })
        })?;
        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row?.into_session()?);
        }
        Ok(sessions)
    }

    /// Loads user preferences, falling back to defaults when none are stored.
    pub fn load_user_config(&self) -> Result<UserConfig, DbError> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?",
                [USER_CONFIG_KEY],
                |row| row.get(0),
            )
            .optional()?;
        match value {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(UserConfig::default()),
        }
    }

    /// Replaces every stored activity.
    pub fn replace_activities(&mut self, activities: &[Activity]) -> Result<(), DbError> {
        let tx = self.conn.transaction()?;
        write_activities(&tx, activities)?;
        tx.commit()?;
        Ok(())
    }

    /// Replaces every stored session.
    pub fn replace_sessions(&mut self, sessions: &[Session]) -> Result<(), DbError> {
        let tx = self.conn.transaction()?;
        write_sessions(&tx, sessions)?;
        tx.commit()?;
        Ok(())
    }

    /// Stores user preferences.
    pub fn store_user_config(&mut self, config: &UserConfig) -> Result<(), DbError> {
        write_user_config(&self.conn, config)
    }

    /// Validates `bundle`, then replaces all three collections in one transaction.
    pub fn import_bundle(&mut self, bundle: &Bundle) -> Result<ImportSummary, BundleError> {
        bundle.validate()?;
        self.write_bundle(bundle).map_err(StoreError::from)?;
        let summary = bundle.summary();
        tracing::info!(
            activities = summary.activities,
            sessions = summary.sessions,
            "bundle imported"
        );
        Ok(summary)
    }

    fn write_bundle(&mut self, bundle: &Bundle) -> Result<(), DbError> {
        let tx = self.conn.transaction()?;
        write_activities(&tx, &bundle.activities)?;
        write_sessions(&tx, &bundle.logs)?;
        write_user_config(&tx, &bundle.user_config)?;
        tx.commit()?;
        Ok(())
    }
}

fn write_activities(conn: &Connection, activities: &[Activity]) -> Result<(), DbError> {
    conn.execute("DELETE FROM activities", [])?;
    let mut stmt = conn.prepare(
        "
        INSERT INTO activities
        (id, position, label, category, priority, cognitive_load, daily_max, session_max, archived)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ",
    )?;
    for (position, activity) in (0_i64..).zip(activities) {
        stmt.execute(params![
            activity.id.as_str(),
            position,
            activity.label,
            activity.category.as_str(),
            activity.priority.as_str(),
            activity.cognitive_load.as_str(),
            activity.daily_max,
            activity.session_max,
            activity.archived,
        ])?;
    }
    tracing::debug!(count = activities.len(), "activities replaced");
    Ok(())
}

fn write_sessions(conn: &Connection, sessions: &[Session]) -> Result<(), DbError> {
    conn.execute("DELETE FROM sessions", [])?;
    let mut stmt = conn.prepare(
        "
        INSERT INTO sessions
        (id, position, activity_id, session_start, session_end, intervals, total_duration, auto_stopped)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ",
    )?;
    for (position, session) in (0_i64..).zip(sessions) {
        let intervals = serde_json::to_string(&session.intervals)?;
        stmt.execute(params![
            session.id.as_str(),
            position,
            session.activity_id.as_str(),
            session.session_start,
            session.session_end,
            intervals,
            session.total_duration,
            session.auto_stopped,
        ])?;
    }
    tracing::debug!(count = sessions.len(), "sessions replaced");
    Ok(())
}

fn write_user_config(conn: &Connection, config: &UserConfig) -> Result<(), DbError> {
    let json = serde_json::to_string(config)?;
    conn.execute(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![USER_CONFIG_KEY, json],
    )?;
    Ok(())
}

/// Raw `activities` row before enum parsing.
struct ActivityRow {
    id: String,
    label: String,
    category: String,
    priority: String,
    cognitive_load: String,
    daily_max: Option<u32>,
    session_max: Option<u32>,
    archived: bool,
}

impl ActivityRow {
    fn into_activity(self) -> Result<Activity, DbError> {
        let invalid = |source| DbError::InvalidRow {
            table: "activities",
            id: self.id.clone(),
            source,
        };
        Ok(Activity {
            id: ActivityId::new(self.id.clone()).map_err(invalid)?,
            category: self.category.parse().map_err(invalid)?,
            priority: self.priority.parse().map_err(invalid)?,
            cognitive_load: self.cognitive_load.parse().map_err(invalid)?,
            label: self.label,
            daily_max: self.daily_max,
            session_max: self.session_max,
            archived: self.archived,
        })
    }
}

/// Raw `sessions` row before ID validation and interval decoding.
struct SessionRow {
    id: String,
    activity_id: String,
    session_start: i64,
    session_end: Option<i64>,
    intervals: String,
    total_duration: i64,
    auto_stopped: bool,
}

impl SessionRow {
    fn into_session(self) -> Result<Session, DbError> {
        let invalid = |source| DbError::InvalidRow {
            table: "sessions",
            id: self.id.clone(),
            source,
        };
        let intervals: Vec<Interval> = serde_json::from_str(&self.intervals)?;
        Ok(Session {
            id: SessionId::new(self.id.clone()).map_err(invalid)?,
            activity_id: ActivityId::new(self.activity_id.clone()).map_err(invalid)?,
            session_start: self.session_start,
            session_end: self.session_end,
            intervals,
            total_duration: self.total_duration,
            auto_stopped: self.auto_stopped,
        })
    }
}

impl ActivityStore for Database {
    fn activities(&self) -> Result<Vec<Activity>, StoreError> {
        Ok(self.list_activities()?)
    }

    fn save_activities(&mut self, activities: &[Activity]) -> Result<(), StoreError> {
        Ok(self.replace_activities(activities)?)
    }
}

impl SessionStore for Database {
    fn sessions(&self) -> Result<Vec<Session>, StoreError> {
        Ok(self.list_sessions()?)
    }

    fn save_sessions(&mut self, sessions: &[Session]) -> Result<(), StoreError> {
        Ok(self.replace_sessions(sessions)?)
    }
}

impl ConfigStore for Database {
    fn user_config(&self) -> Result<UserConfig, StoreError> {
        Ok(self.load_user_config()?)
    }

    fn save_user_config(&mut self, config: &UserConfig) -> Result<(), StoreError> {
        Ok(self.store_user_config(config)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tw_core::clock::ManualClock;
    use tw_core::timer::TimerEngine;
    use tw_core::types::{Category, CognitiveLoad, Priority, WeekStart};

    // 2024-07-15T09:00:00Z
    const T0: i64 = 1_721_034_000_000;

    fn activity(id: &str, label: &str) -> Activity {
        Activity {
            id: ActivityId::new(id).expect("activity id"),
            label: label.to_string(),
            category: Category::Professional,
            priority: Priority::High,
            cognitive_load: CognitiveLoad::Intense,
            daily_max: Some(120),
            session_max: None,
            archived: false,
        }
    }

    fn completed(id: &str, activity_id: &str, start: i64) -> Session {
        Session {
            id: SessionId::new(id).expect("session id"),
            activity_id: ActivityId::new(activity_id).expect("activity id"),
            session_start: start,
            session_end: Some(start + 900_000),
            intervals: vec![
                Interval {
                    start,
                    end: Some(start + 300_000),
                    duration: 300,
                },
                Interval {
                    start: start + 600_000,
                    end: Some(start + 900_000),
                    duration: 300,
                },
            ],
            total_duration: 600,
            auto_stopped: true,
        }
    }

    #[test]
    fn open_in_memory_database() {
        let db = Database::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn schema_matches_data_model() {
        let db = Database::open_in_memory().expect("open in-memory db");

        assert_eq!(
            table_columns(&db.conn, "activities"),
            vec![
                "id",
                "position",
                "label",
                "category",
                "priority",
                "cognitive_load",
                "daily_max",
                "session_max",
                "archived",
            ]
        );
        assert_eq!(
            table_columns(&db.conn, "sessions"),
            vec![
                "id",
                "position",
                "activity_id",
                "session_start",
                "session_end",
                "intervals",
                "total_duration",
                "auto_stopped",
            ]
        );
        assert_eq!(table_columns(&db.conn, "settings"), vec!["key", "value"]);

        let indexes = index_names(&db.conn, "sessions");
        assert!(indexes.contains("idx_sessions_start"));
        assert!(indexes.contains("idx_sessions_activity"));
    }

    #[test]
    fn init_is_idempotent() {
        let db = Database::open_in_memory().expect("open in-memory db");
        db.init().expect("second init");
    }

    #[test]
    fn activities_round_trip_in_order() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        let list = vec![activity("b", "Beta"), activity("a", "Alpha")];
        db.save_activities(&list).expect("save");
        assert_eq!(db.activities().expect("load"), list);

        db.save_activities(&list[1..]).expect("replace");
        assert_eq!(db.activities().expect("load"), vec![activity("a", "Alpha")]);
        assert_eq!(
            db.activity(&ActivityId::new("a").expect("id")).expect("lookup"),
            Some(activity("a", "Alpha"))
        );
    }

    #[test]
    fn sessions_round_trip_with_intervals() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        let log = vec![completed("s2", "a", T0 + 3_600_000), completed("s1", "gone", T0)];
        db.save_sessions(&log).expect("save");
        assert_eq!(db.sessions().expect("load"), log);

        let raw: String = db
            .conn
            .query_row("SELECT intervals FROM sessions WHERE id = 's1'", [], |row| {
                row.get(0)
            })
            .expect("raw intervals");
        let value: serde_json::Value = serde_json::from_str(&raw).expect("json");
        assert_eq!(value[1]["duration"], 300);
    }

    #[test]
    fn positions_follow_saved_order() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        db.save_sessions(&[
            completed("s2", "a", T0 + 3_600_000),
            completed("s1", "a", T0),
            completed("s3", "a", T0 + 7_200_000),
        ])
        .expect("save");

        let mut stmt = db
            .conn
            .prepare("SELECT id, position FROM sessions ORDER BY position")
            .expect("prepare");
        let rows: Vec<(String, i64)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .expect("query")
            .collect::<Result<_, _>>()
            .expect("rows");
        assert_eq!(
            rows,
            vec![
                ("s2".to_string(), 0),
                ("s1".to_string(), 1),
                ("s3".to_string(), 2),
            ]
        );
    }

    #[test]
    fn user_config_defaults_then_persists() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        assert_eq!(db.user_config().expect("load"), UserConfig::default());

        let config = UserConfig {
            week_start: WeekStart::Sunday,
            sound_enabled: false,
            ..UserConfig::default()
        };
        db.save_user_config(&config).expect("save");
        db.save_user_config(&config).expect("save twice");
        assert_eq!(db.user_config().expect("load"), config);
    }

    #[test]
    fn corrupt_rows_surface_as_errors() {
        let db = Database::open_in_memory().expect("open in-memory db");
        db.conn
            .execute(
                "INSERT INTO activities VALUES ('x', 0, 'X', 'hobby', 'low', 'light', NULL, NULL, 0)",
                [],
            )
            .expect("insert");
        let err = db.list_activities().unwrap_err();
        assert!(matches!(
            err,
            DbError::InvalidRow {
                table: "activities",
                ..
            }
        ));
        assert!(db.activities().is_err());
    }

    #[test]
    fn import_bundle_is_all_or_nothing() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        db.save_activities(&[activity("keep", "Keep")]).expect("seed");

        let mut bad = Bundle {
            activities: vec![activity("a", "Alpha")],
            logs: vec![completed("s1", "a", T0)],
            user_config: UserConfig::default(),
        };
        bad.logs[0].intervals[1].end = None;
        assert!(db.import_bundle(&bad).is_err());
        assert_eq!(db.activities().expect("load"), vec![activity("keep", "Keep")]);

        bad.logs[0].intervals[1].end = Some(T0 + 900_000);
        let summary = db.import_bundle(&bad).expect("import");
        assert_eq!(summary.sessions, 1);
        assert_eq!(tw_core::export_bundle(&db).expect("export"), bad);
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tw.db");
        {
            let mut db = Database::open(&path).expect("open");
            db.save_activities(&[activity("a", "Alpha")]).expect("save");
            db.save_sessions(&[completed("s1", "a", T0)]).expect("save");
        }
        let db = Database::open(&path).expect("reopen");
        assert_eq!(db.activities().expect("load").len(), 1);
        assert_eq!(db.sessions().expect("load")[0].total_duration, 600);
    }

    #[test]
    fn timer_appends_to_database_log() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        db.save_activities(&[activity("a", "Alpha")]).expect("seed");
        db.save_sessions(&[completed("s0", "a", T0 - 86_400_000)])
            .expect("seed log");

        let clock = ManualClock::new(T0);
        let mut engine = TimerEngine::new(&mut db, clock.clone());
        engine
            .start_session(&ActivityId::new("a").expect("id"))
            .expect("start");
        clock.advance_secs(90);
        let saved = engine.stop().expect("stop");

        let log = db.sessions().expect("load");
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].id.as_str(), "s0");
        assert_eq!(log[1], saved);
        assert_eq!(log[1].total_duration, 90);
    }

    fn table_columns(conn: &Connection, table: &str) -> Vec<String> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({table})"))
            .expect("prepare table_info");
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .expect("query table_info");
        rows.map(|row| row.expect("table_info row")).collect()
    }

    fn index_names(conn: &Connection, table: &str) -> HashSet<String> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA index_list({table})"))
            .expect("prepare index_list");
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .expect("query index_list");
        rows.map(|row| row.expect("index_list row")).collect()
    }
}
