//! Repository seams for activities, sessions, and user preferences.
//!
//! Every collection is read and written whole: `save_*` replaces the stored
//! collection with exactly the slice it is given. The engines assume a
//! single writer; coordinating several processes is left to the caller.

use thiserror::Error;

use crate::types::{Activity, ActivityId, Session, UserConfig};

/// Opaque failure reported by a storage backend.
#[derive(Debug, Error)]
#[error("storage error: {message}")]
pub struct StoreError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl StoreError {
    /// A backend failure described only by a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wraps a backend error.
    pub fn backend<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Read/write access to the activity collection.
pub trait ActivityStore {
    fn activities(&self) -> Result<Vec<Activity>, StoreError>;

    fn save_activities(&mut self, activities: &[Activity]) -> Result<(), StoreError>;

    /// Looks up one activity by ID, archived or not.
    fn activity(&self, id: &ActivityId) -> Result<Option<Activity>, StoreError> {
        Ok(self.activities()?.into_iter().find(|a| &a.id == id))
    }
}

/// Read/write access to the completed session log.
pub trait SessionStore {
    fn sessions(&self) -> Result<Vec<Session>, StoreError>;

    fn save_sessions(&mut self, sessions: &[Session]) -> Result<(), StoreError>;
}

/// Read/write access to user preferences.
pub trait ConfigStore {
    /// Stored preferences, or [`UserConfig::default`] when none are saved.
    fn user_config(&self) -> Result<UserConfig, StoreError>;

    fn save_user_config(&mut self, config: &UserConfig) -> Result<(), StoreError>;
}

impl<S: ActivityStore + ?Sized> ActivityStore for &mut S {
    fn activities(&self) -> Result<Vec<Activity>, StoreError> {
        (**self).activities()
    }

    fn save_activities(&mut self, activities: &[Activity]) -> Result<(), StoreError> {
        (**self).save_activities(activities)
    }

    fn activity(&self, id: &ActivityId) -> Result<Option<Activity>, StoreError> {
        (**self).activity(id)
    }
}

impl<S: SessionStore + ?Sized> SessionStore for &mut S {
    fn sessions(&self) -> Result<Vec<Session>, StoreError> {
        (**self).sessions()
    }

    fn save_sessions(&mut self, sessions: &[Session]) -> Result<(), StoreError> {
        (**self).save_sessions(sessions)
    }
}

impl<S: ConfigStore + ?Sized> ConfigStore for &mut S {
    fn user_config(&self) -> Result<UserConfig, StoreError> {
        (**self).user_config()
    }

    fn save_user_config(&mut self, config: &UserConfig) -> Result<(), StoreError> {
        (**self).save_user_config(config)
    }
}

/// In-memory store, mainly for tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    pub activities: Vec<Activity>,
    pub sessions: Vec<Session>,
    pub config: Option<UserConfig>,
    /// When set, every `save_*` call fails. Used to exercise error paths.
    pub fail_writes: bool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_activities(activities: Vec<Activity>) -> Self {
        Self {
            activities,
            ..Self::default()
        }
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::msg("writes disabled"));
        }
        Ok(())
    }
}

impl ActivityStore for MemoryStore {
    fn activities(&self) -> Result<Vec<Activity>, StoreError> {
        Ok(self.activities.clone())
    }

    fn save_activities(&mut self, activities: &[Activity]) -> Result<(), StoreError> {
        self.check_writable()?;
        self.activities = activities.to_vec();
        Ok(())
    }
}

impl SessionStore for MemoryStore {
    fn sessions(&self) -> Result<Vec<Session>, StoreError> {
        Ok(self.sessions.clone())
    }

    fn save_sessions(&mut self, sessions: &[Session]) -> Result<(), StoreError> {
        self.check_writable()?;
        self.sessions = sessions.to_vec();
        Ok(())
    }
}

impl ConfigStore for MemoryStore {
    fn user_config(&self) -> Result<UserConfig, StoreError> {
        Ok(self.config.clone().unwrap_or_default())
    }

    fn save_user_config(&mut self, config: &UserConfig) -> Result<(), StoreError> {
        self.check_writable()?;
        self.config = Some(config.clone());
        Ok(())
    }
}
