//! services/agent/src/adapters/sqlite_store.rs
//!
//! This module contains the storage adapter, the concrete implementation of the
//! `ReminderStore`, `SessionStore` and `SettingsStore` ports. It keeps the reminder
//! table and the auxiliary token/settings tables in a local SQLite file via `sqlx`.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use habit_reminder_core::domain::{Frequency, ReminderRecord, Session};
use habit_reminder_core::ports::{
    PortError, PortResult, ReminderStore, SessionStore, SettingsStore,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

const SESSION_KEY: &str = "token";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A SQLite adapter implementing all persistence ports.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if missing) the database and ensures the tables exist.
    ///
    /// Safe to call from several processes at once: migrations are idempotent and
    /// SQLite serializes the writers.
    pub async fn open(database_url: &str) -> Result<Self, sqlx::Error> {
        let in_memory = database_url.contains(":memory:");
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 5 })
            .connect_with(options)
            .await?;

        let store = Self::new(pool);
        store.run_migrations().await?;
        info!("Reminder store opened at {}", database_url);
        Ok(store)
    }

    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn storage(e: sqlx::Error) -> PortError {
    PortError::Storage(e.to_string())
}

//=========================================================================================
// Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ReminderRow {
    id: String,
    title: String,
    time: String,
    days: String,
    frequency: String,
    enabled: bool,
    handled_through: Option<NaiveDateTime>,
    snoozed_until: Option<NaiveDateTime>,
}

impl ReminderRow {
    fn to_domain(self) -> Result<ReminderRecord, String> {
        let frequency = Frequency::from_str(&self.frequency)?;
        let days: Vec<String> =
            serde_json::from_str(&self.days).map_err(|e| format!("invalid days: {e}"))?;
        Ok(ReminderRecord {
            id: self.id,
            title: self.title,
            time: self.time,
            days,
            frequency,
            enabled: self.enabled,
            handled_through: self.handled_through,
            snoozed_until: self.snoozed_until,
        })
    }
}

#[derive(FromRow)]
struct SessionRow {
    token: String,
    user_id: Option<String>,
}

//=========================================================================================
// `ReminderStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ReminderStore for SqliteStore {
    async fn put(&self, record: ReminderRecord) -> PortResult<()> {
        let days = serde_json::to_string(&record.days)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        // A single statement, so readers never observe a partially written record.
        sqlx::query(
            "INSERT INTO reminders (id, title, time, days, frequency, enabled, handled_through, snoozed_until)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                time = excluded.time,
                days = excluded.days,
                frequency = excluded.frequency,
                enabled = excluded.enabled,
                handled_through = excluded.handled_through,
                snoozed_until = excluded.snoozed_until",
        )
        .bind(&record.id)
        .bind(&record.title)
        .bind(&record.time)
        .bind(days)
        .bind(record.frequency.as_str())
        .bind(record.enabled)
        .bind(record.handled_through)
        .bind(record.snoozed_until)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn get(&self, id: &str) -> PortResult<Option<ReminderRecord>> {
        let row = sqlx::query_as::<_, ReminderRow>(
            "SELECT id, title, time, days, frequency, enabled, handled_through, snoozed_until
             FROM reminders WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        row.map(|r| {
            r.to_domain().map_err(|reason| PortError::MalformedRecord {
                id: id.to_string(),
                reason,
            })
        })
        .transpose()
    }

    async fn get_all(&self) -> PortResult<Vec<ReminderRecord>> {
        let rows = sqlx::query_as::<_, ReminderRow>(
            "SELECT id, title, time, days, frequency, enabled, handled_through, snoozed_until
             FROM reminders",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.id.clone();
            match row.to_domain() {
                Ok(record) => records.push(record),
                Err(reason) => warn!("Skipping unreadable reminder {}: {}", id, reason),
            }
        }
        Ok(records)
    }

    async fn delete(&self, id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM reminders WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(())
    }
}

//=========================================================================================
// `SessionStore` and `SettingsStore` Trait Implementations
//=========================================================================================

#[async_trait]
impl SessionStore for SqliteStore {
    async fn load_session(&self) -> PortResult<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>("SELECT token, user_id FROM auth WHERE key = ?")
            .bind(SESSION_KEY)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        Ok(row.map(|r| Session {
            token: r.token,
            user_id: r.user_id,
        }))
    }

    async fn save_session(&self, session: Session) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO auth (key, token, user_id) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET token = excluded.token, user_id = excluded.user_id",
        )
        .bind(SESSION_KEY)
        .bind(&session.token)
        .bind(&session.user_id)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn clear_session(&self) -> PortResult<()> {
        sqlx::query("DELETE FROM auth WHERE key = ?")
            .bind(SESSION_KEY)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for SqliteStore {
    async fn get_setting(&self, key: &str) -> PortResult<Option<String>> {
        sqlx::query_scalar::<_, String>("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)
    }

    async fn put_setting(&self, key: &str, value: &str) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO settings (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }
}
