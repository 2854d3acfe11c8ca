//! services/agent/src/runtime/controller.rs
//!
//! The foreground side: what runs when an app window saves a habit with reminders.
//! It validates and stores the record, asks for permission at opt-in, tells the
//! backend, and hands the record to the background runtime to arm.

use chrono::NaiveDateTime;
use habit_reminder_core::domain::{
    Frequency, PermissionOutcome, ReminderRecord, ReminderRegistration, Session,
    DEFAULT_REMINDER_TIME,
};
use habit_reminder_core::ports::{
    Clock, HabitBackend, PortError, PortResult, ReminderStore, SessionStore, SettingsStore,
};
use habit_reminder_core::schedule::{delay_until, next_wakeup, Schedule, ScheduleError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use super::background::BackgroundRuntime;
use super::permission::PermissionGate;

pub const DEVICE_TOKEN_SETTING: &str = "device_token";

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("Invalid schedule: {0}")]
    Schedule(#[from] ScheduleError),
    #[error("A reminder needs a title")]
    EmptyTitle,
    #[error(transparent)]
    Port(#[from] PortError),
}

/// The fields a window submits when saving a habit's reminder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderInput {
    pub title: String,
    /// Falls back to the default reminder time.
    pub time: Option<String>,
    pub days: Vec<String>,
    pub frequency: Frequency,
    pub enabled: bool,
}

/// Immediate feedback for the window that saved the reminder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    pub record: ReminderRecord,
    pub next_fire_at: Option<NaiveDateTime>,
    pub delay: Option<Duration>,
    /// Only negotiated when the reminder is on.
    pub permission: Option<PermissionOutcome>,
}

#[derive(Clone)]
pub struct ReminderController {
    store: Arc<dyn ReminderStore>,
    sessions: Arc<dyn SessionStore>,
    settings: Arc<dyn SettingsStore>,
    backend: Arc<dyn HabitBackend>,
    gate: PermissionGate,
    runtime: Arc<BackgroundRuntime>,
    clock: Arc<dyn Clock>,
}

impl ReminderController {
    pub fn new(
        store: Arc<dyn ReminderStore>,
        sessions: Arc<dyn SessionStore>,
        settings: Arc<dyn SettingsStore>,
        backend: Arc<dyn HabitBackend>,
        gate: PermissionGate,
        runtime: Arc<BackgroundRuntime>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            sessions,
            settings,
            backend,
            gate,
            runtime,
            clock,
        }
    }

    /// Upserts the reminder for habit `id`. Occurrences up to now count as handled,
    /// so saving at 09:00 a reminder for 08:00 waits for tomorrow.
    pub async fn save_habit_reminder(
        &self,
        id: &str,
        input: ReminderInput,
    ) -> Result<SaveOutcome, ControllerError> {
        let title = input.title.trim();
        if title.is_empty() {
            return Err(ControllerError::EmptyTitle);
        }
        let time = input
            .time
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_REMINDER_TIME.to_string());

        let mut record = ReminderRecord::new(id, title, time, input.frequency).with_days(input.days);
        if record.frequency == Frequency::Daily {
            record.days.clear();
        }
        record.enabled = input.enabled;
        Schedule::from_record(&record)?;

        // A new schedule supersedes any pending snooze.
        let now = self.clock.now();
        record.handled_through = Some(now);
        self.store.put(record.clone()).await?;
        info!("Reminder '{}' saved for {} ({})", record.title, record.time, record.frequency);

        let permission = if record.enabled {
            self.register(&record).await;
            Some(self.opt_in().await)
        } else {
            None
        };
        Ok(self.finish(record, now, permission))
    }

    /// Toggles a stored reminder without touching its schedule.
    pub async fn set_enabled(&self, id: &str, enabled: bool) -> Result<SaveOutcome, ControllerError> {
        let mut record = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| PortError::NotFound(format!("reminder {id}")))?;
        Schedule::from_record(&record)?;
        let now = self.clock.now();

        record.enabled = enabled;
        if enabled {
            record.handled_through = Some(now);
        } else {
            record.snoozed_until = None;
        }
        self.store.put(record.clone()).await?;
        info!(
            "Reminder '{}' {}",
            record.title,
            if enabled { "enabled" } else { "disabled" }
        );

        let permission = if enabled {
            Some(self.opt_in().await)
        } else {
            None
        };
        Ok(self.finish(record, now, permission))
    }

    /// Called once the owning habit has been deleted on the backend.
    pub async fn remove(&self, id: &str) -> PortResult<()> {
        self.store.delete(id).await?;
        self.runtime.disarm(id);
        info!("Reminder {} removed", id);
        Ok(())
    }

    pub async fn list(&self) -> PortResult<Vec<ReminderRecord>> {
        self.store.get_all().await
    }

    pub async fn start_session(&self, session: Session) -> PortResult<()> {
        self.sessions.save_session(session).await
    }

    pub async fn end_session(&self) -> PortResult<()> {
        self.sessions.clear_session().await
    }

    /// Arms the record and reports when it will actually wake next.
    fn finish(
        &self,
        record: ReminderRecord,
        now: NaiveDateTime,
        permission: Option<PermissionOutcome>,
    ) -> SaveOutcome {
        self.runtime.arm(&record);
        let next_fire_at = next_wakeup(&record, now).ok().flatten();
        SaveOutcome {
            delay: next_fire_at.map(|at| delay_until(now, at)),
            next_fire_at,
            permission,
            record,
        }
    }

    async fn opt_in(&self) -> PermissionOutcome {
        match self.gate.ensure_permission().await {
            Ok(PermissionOutcome::Granted) => {
                self.persist_grant().await;
                PermissionOutcome::Granted
            }
            Ok(outcome) => {
                info!("Notifications {}; reminders fall back to in-app toasts", outcome.as_str());
                outcome
            }
            Err(e) => {
                warn!("Permission check failed, using in-app toasts: {}", e);
                PermissionOutcome::Unsupported
            }
        }
    }

    /// Single attempt; failure never affects local scheduling.
    async fn register(&self, record: &ReminderRecord) {
        let session = match self.sessions.load_session().await {
            Ok(Some(session)) => session,
            Ok(None) => {
                warn!("No auth token stored; reminder '{}' not registered with the backend", record.title);
                return;
            }
            Err(e) => {
                warn!("Auth token unreadable, reminder not registered: {}", e);
                return;
            }
        };
        let mut registration = ReminderRegistration::from(record);
        registration.user_id = session.user_id;
        if let Err(e) = self.backend.register_reminder(&session.token, &registration).await {
            warn!("Backend registration of '{}' failed: {}", record.title, e);
        }
    }

    /// Tells the backend this device was granted notifications. Single attempt.
    pub async fn persist_grant(&self) {
        let device_token = match self.device_token().await {
            Ok(token) => token,
            Err(e) => {
                warn!("Device token unavailable, grant not persisted: {}", e);
                return;
            }
        };
        let session = self.sessions.load_session().await.ok().flatten();
        let bearer = session.as_ref().map(|s| s.token.as_str());
        let user_id = session.as_ref().and_then(|s| s.user_id.as_deref());
        if let Err(e) = self
            .backend
            .save_notification_token(bearer, user_id, &device_token)
            .await
        {
            warn!("Could not persist notification grant: {}", e);
        }
    }

    async fn device_token(&self) -> PortResult<String> {
        if let Some(token) = self.settings.get_setting(DEVICE_TOKEN_SETTING).await? {
            return Ok(token);
        }
        let token = Uuid::new_v4().to_string();
        self.settings.put_setting(DEVICE_TOKEN_SETTING, &token).await?;
        Ok(token)
    }
}
