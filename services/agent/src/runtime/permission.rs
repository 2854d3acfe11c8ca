use habit_reminder_core::domain::{PermissionOutcome, PermissionState};
use habit_reminder_core::ports::{NotificationPlatform, PortResult};
use std::sync::Arc;
use tracing::info;

/// Negotiates notification permission with the host platform.
#[derive(Clone)]
pub struct PermissionGate {
    platform: Arc<dyn NotificationPlatform>,
}

impl PermissionGate {
    pub fn new(platform: Arc<dyn NotificationPlatform>) -> Self {
        Self { platform }
    }

    /// Prompts at most once, and only while the state is undetermined. A prompt the
    /// user dismisses without answering counts as denied for this call.
    pub async fn ensure_permission(&self) -> PortResult<PermissionOutcome> {
        let state = match self.platform.permission().await? {
            PermissionState::Default => {
                info!("Requesting notification permission");
                self.platform.request_permission().await?
            }
            determined => determined,
        };
        Ok(match state {
            PermissionState::Granted => PermissionOutcome::Granted,
            PermissionState::Unsupported => PermissionOutcome::Unsupported,
            PermissionState::Denied | PermissionState::Default => PermissionOutcome::Denied,
        })
    }

    /// Whether a system notification may be shown right now. Never prompts.
    pub async fn allows_system(&self) -> PortResult<bool> {
        Ok(self.platform.permission().await? == PermissionState::Granted)
    }
}
