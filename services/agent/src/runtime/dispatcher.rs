//! services/agent/src/runtime/dispatcher.rs
//!
//! Turns an interaction with a shown notification (or in-app toast) into a backend
//! completion, a snooze, or an "open app" focus request.

use chrono::NaiveDateTime;
use habit_reminder_core::domain::{Interaction, InteractionKind, NotificationData};
use habit_reminder_core::ports::{
    AppWindows, Clock, HabitBackend, NotificationPlatform, PortError, ReminderStore, SessionStore,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::background::BackgroundRuntime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Completed,
    /// The backend call failed. Completions are not queued or retried.
    CompletionLost,
    AuthMissing,
    Snoozed { until: NaiveDateTime },
    /// The reminder was disabled after the notification was shown.
    SnoozeDropped,
    Opened,
}

#[derive(Clone)]
pub struct ActionDispatcher {
    platform: Arc<dyn NotificationPlatform>,
    windows: Arc<dyn AppWindows>,
    sessions: Arc<dyn SessionStore>,
    backend: Arc<dyn HabitBackend>,
    store: Arc<dyn ReminderStore>,
    runtime: Arc<BackgroundRuntime>,
    clock: Arc<dyn Clock>,
    app_url: String,
    snooze: Duration,
}

impl ActionDispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        platform: Arc<dyn NotificationPlatform>,
        windows: Arc<dyn AppWindows>,
        sessions: Arc<dyn SessionStore>,
        backend: Arc<dyn HabitBackend>,
        store: Arc<dyn ReminderStore>,
        runtime: Arc<BackgroundRuntime>,
        clock: Arc<dyn Clock>,
        app_url: &str,
        snooze: Duration,
    ) -> Self {
        Self {
            platform,
            windows,
            sessions,
            backend,
            store,
            runtime,
            clock,
            app_url: app_url.to_string(),
            snooze,
        }
    }

    /// The notification is closed first, whatever the action.
    pub async fn dispatch(&self, interaction: Interaction) -> DispatchOutcome {
        if let Some(tag) = interaction.tag {
            if let Err(e) = self.platform.close(tag).await {
                warn!("Could not close notification {}: {}", tag, e);
            }
        }

        match interaction.kind() {
            InteractionKind::Complete => self.complete(&interaction.data).await,
            InteractionKind::Snooze => self.snooze(&interaction.data, self.snooze).await,
            InteractionKind::Open => {
                if let Err(e) = self.windows.focus_or_open(&self.app_url).await {
                    error!("Could not open the app: {}", e);
                }
                DispatchOutcome::Opened
            }
        }
    }

    async fn complete(&self, data: &NotificationData) -> DispatchOutcome {
        let session = match self.sessions.load_session().await {
            Ok(Some(session)) => session,
            Ok(None) => {
                error!(
                    "No auth token stored; completion of '{}' dropped",
                    data.habit_title
                );
                return DispatchOutcome::AuthMissing;
            }
            Err(e) => {
                error!(
                    "Auth token unreadable ({}); completion of '{}' dropped",
                    e, data.habit_title
                );
                return DispatchOutcome::AuthMissing;
            }
        };

        match self
            .backend
            .complete_habit(&session.token, &data.habit_title)
            .await
        {
            Ok(()) => {
                info!("Habit '{}' marked complete", data.habit_title);
                DispatchOutcome::Completed
            }
            Err(PortError::Network(reason)) => {
                error!(
                    "Network failure, completion of '{}' lost: {}",
                    data.habit_title, reason
                );
                DispatchOutcome::CompletionLost
            }
            Err(e) => {
                error!("Completion of '{}' lost: {}", data.habit_title, e);
                DispatchOutcome::CompletionLost
            }
        }
    }

    /// Schedules a one-shot re-fire carrying the same title. The record's `time` and
    /// `days` are left untouched.
    pub async fn snooze(&self, data: &NotificationData, delay: Duration) -> DispatchOutcome {
        let until = self.clock.now()
            + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());

        if let Some(id) = &data.habit_id {
            match self.store.get(id).await {
                Ok(Some(mut record)) if record.enabled => {
                    record.snoozed_until = Some(until);
                    match self.store.put(record.clone()).await {
                        Ok(()) => {
                            self.runtime.arm(&record);
                            info!("Reminder '{}' snoozed until {}", record.title, until);
                            return DispatchOutcome::Snoozed { until };
                        }
                        Err(e) => warn!("Could not persist snooze of {}: {}", id, e),
                    }
                }
                Ok(Some(record)) => {
                    info!("Reminder '{}' is disabled; snooze dropped", record.title);
                    return DispatchOutcome::SnoozeDropped;
                }
                Ok(None) => {}
                Err(e) => warn!("Could not load reminder {} to snooze: {}", id, e),
            }
        }

        self.runtime.snooze_untracked(&data.habit_title, delay);
        info!("'{}' snoozed until {}", data.habit_title, until);
        DispatchOutcome::Snoozed { until }
    }

    /// Feeds interactions from the platform channel until it closes.
    pub async fn serve(self, mut interactions: mpsc::Receiver<Interaction>) {
        while let Some(interaction) = interactions.recv().await {
            let outcome = self.dispatch(interaction).await;
            debug!("Interaction handled: {:?}", outcome);
        }
    }
}
