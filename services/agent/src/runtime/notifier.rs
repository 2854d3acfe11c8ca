//! services/agent/src/runtime/notifier.rs
//!
//! Renders reminders as system notifications, or as in-app toasts when the platform
//! will not show them. A due reminder always produces one or the other.

use habit_reminder_core::domain::{Notification, PushPayload, Toast, ToastSeverity};
use habit_reminder_core::ports::{AppWindows, Clock, NotificationPlatform, PortResult};
use std::sync::Arc;
use tracing::{debug, warn};

use super::permission::PermissionGate;

/// Where a notification ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    System,
    InApp,
}

#[derive(Clone)]
pub struct Notifier {
    platform: Arc<dyn NotificationPlatform>,
    gate: PermissionGate,
    windows: Arc<dyn AppWindows>,
    clock: Arc<dyn Clock>,
}

impl Notifier {
    pub fn new(
        platform: Arc<dyn NotificationPlatform>,
        windows: Arc<dyn AppWindows>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            gate: PermissionGate::new(platform.clone()),
            platform,
            windows,
            clock,
        }
    }

    /// A locally scheduled reminder for `habit_title`.
    pub async fn show_reminder(
        &self,
        habit_id: Option<&str>,
        habit_title: &str,
    ) -> PortResult<Delivery> {
        let notification = Notification::reminder(habit_id, habit_title, self.clock.timestamp_ms());
        self.show(notification).await
    }

    /// An inbound push message; shown as-is without consulting the scheduler.
    pub async fn show_push(&self, payload: &PushPayload) -> PortResult<Delivery> {
        self.show(Notification::push(payload, self.clock.timestamp_ms()))
            .await
    }

    /// Returns once the notification has been handed to the platform or the windows.
    pub async fn show(&self, notification: Notification) -> PortResult<Delivery> {
        let allowed = match self.gate.allows_system().await {
            Ok(allowed) => allowed,
            Err(e) => {
                warn!("Could not read notification permission: {}", e);
                false
            }
        };

        let mut severity = ToastSeverity::Info;
        if allowed {
            match self.platform.show(notification.clone()).await {
                Ok(()) => {
                    debug!("Notification {} shown for '{}'", notification.tag, notification.data.habit_title);
                    return Ok(Delivery::System);
                }
                Err(e) => {
                    warn!("System notification failed, falling back to in-app: {}", e);
                    severity = ToastSeverity::Warning;
                }
            }
        }

        let toast = Toast {
            message: format!("{}: {}", notification.title, notification.body),
            severity,
            data: Some(notification.data),
        };
        self.windows.show_in_app(toast).await?;
        Ok(Delivery::InApp)
    }
}
