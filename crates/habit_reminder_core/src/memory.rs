//! crates/habit_reminder_core/src/memory.rs
//!
//! In-memory implementations of the persistence ports. They hold no state across
//! process restarts and are meant for tests and embedders that do not need durability.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use crate::domain::{ReminderRecord, Session};
use crate::ports::{PortError, PortResult, ReminderStore, SessionStore, SettingsStore};

#[derive(Default)]
pub struct InMemoryReminderStore {
    records: RwLock<HashMap<String, ReminderRecord>>,
    unavailable: AtomicBool,
}

impl InMemoryReminderStore {
    pub fn open() -> Self {
        Self::default()
    }

    /// Makes every subsequent operation fail with a storage error, until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> PortResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(PortError::Storage("reminder store unavailable".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ReminderStore for InMemoryReminderStore {
    async fn put(&self, record: ReminderRecord) -> PortResult<()> {
        self.check()?;
        self.records.write().await.insert(record.id.clone(), record);
        Ok(())
    }

    async fn get(&self, id: &str) -> PortResult<Option<ReminderRecord>> {
        self.check()?;
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn get_all(&self) -> PortResult<Vec<ReminderRecord>> {
        self.check()?;
        Ok(self.records.read().await.values().cloned().collect())
    }

    async fn delete(&self, id: &str) -> PortResult<()> {
        self.check()?;
        self.records.write().await.remove(id);
        Ok(())
    }
}

/// Session and settings storage in one value, mirroring the single auxiliary database.
#[derive(Default)]
pub struct InMemorySessionStore {
    session: RwLock<Option<Session>>,
    settings: RwLock<HashMap<String, String>>,
}

impl InMemorySessionStore {
    pub fn open() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            session: RwLock::new(Some(session)),
            settings: RwLock::default(),
        }
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load_session(&self) -> PortResult<Option<Session>> {
        Ok(self.session.read().await.clone())
    }

    async fn save_session(&self, session: Session) -> PortResult<()> {
        *self.session.write().await = Some(session);
        Ok(())
    }

    async fn clear_session(&self) -> PortResult<()> {
        *self.session.write().await = None;
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for InMemorySessionStore {
    async fn get_setting(&self, key: &str) -> PortResult<Option<String>> {
        Ok(self.settings.read().await.get(key).cloned())
    }

    async fn put_setting(&self, key: &str, value: &str) -> PortResult<()> {
        self.settings
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
