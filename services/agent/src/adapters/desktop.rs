//! services/agent/src/adapters/desktop.rs
//!
//! This module contains the adapter for the host's desktop notifications.
//! It implements the `NotificationPlatform` port by running the notification
//! command (`notify-send` by default) and reporting the chosen action back on
//! the interaction channel.

use async_trait::async_trait;
use habit_reminder_core::domain::{Interaction, Notification, PermissionState, REMINDER_TITLE};
use habit_reminder_core::ports::{NotificationPlatform, PortError, PortResult, SettingsStore};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const PERMISSION_SETTING: &str = "notification_permission";

const APP_NAME: &str = "Habit Tracker";
const DEFAULT_ACTION: &str = "default";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

pub struct DesktopNotifier {
    command: String,
    available: bool,
    asset_dir: PathBuf,
    prompt_timeout: Duration,
    settings: Arc<dyn SettingsStore>,
    interactions: mpsc::Sender<Interaction>,
    /// Live notification processes by tag; cancelling one kills its process.
    live: Arc<Mutex<HashMap<Uuid, CancellationToken>>>,
}

impl DesktopNotifier {
    pub fn new(
        command: &str,
        asset_dir: PathBuf,
        prompt_timeout: Duration,
        settings: Arc<dyn SettingsStore>,
        interactions: mpsc::Sender<Interaction>,
    ) -> Self {
        let available = command_on_path(command);
        if !available {
            warn!(
                "Notification command '{}' not found; system notifications are unsupported",
                command
            );
        }
        Self {
            command: command.to_string(),
            available,
            asset_dir,
            prompt_timeout,
            settings,
            interactions,
            live: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Builds the command line for a notification: one `--action` per button plus
    /// the default (body click) action, then title and body.
    pub fn notify_args(&self, notification: &Notification) -> Vec<String> {
        let icon = self
            .asset_dir
            .join(notification.icon.trim_start_matches('/'));
        let mut args = vec![
            format!("--app-name={APP_NAME}"),
            "--wait".to_string(),
            format!("--icon={}", icon.display()),
        ];
        for action in &notification.actions {
            args.push(format!("--action={}={}", action.id(), action.label()));
        }
        args.push(format!("--action={DEFAULT_ACTION}=Open"));
        args.push(notification.title.clone());
        args.push(notification.body.clone());
        args
    }

    fn prompt_args() -> Vec<String> {
        vec![
            format!("--app-name={APP_NAME}"),
            "--wait".to_string(),
            "--action=allow=Allow".to_string(),
            "--action=block=Block".to_string(),
            REMINDER_TITLE.to_string(),
            "Allow habit reminder notifications?".to_string(),
        ]
    }

    fn spawn(&self, args: &[String]) -> PortResult<tokio::process::Child> {
        Command::new(&self.command)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PortError::Unexpected(format!("failed to run {}: {e}", self.command)))
    }
}

/// The action key printed by the notification command, if the user chose one.
pub fn parse_action(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

fn command_on_path(command: &str) -> bool {
    if command.contains('/') {
        return Path::new(command).is_file();
    }
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(command).is_file()))
        .unwrap_or(false)
}

//=========================================================================================
// `NotificationPlatform` Trait Implementation
//=========================================================================================

#[async_trait]
impl NotificationPlatform for DesktopNotifier {
    async fn permission(&self) -> PortResult<PermissionState> {
        if !self.available {
            return Ok(PermissionState::Unsupported);
        }
        let stored = self.settings.get_setting(PERMISSION_SETTING).await?;
        Ok(stored
            .and_then(|value| PermissionState::from_str(&value).ok())
            .unwrap_or(PermissionState::Default))
    }

    async fn request_permission(&self) -> PortResult<PermissionState> {
        if !self.available {
            return Ok(PermissionState::Unsupported);
        }
        let child = self.spawn(&Self::prompt_args())?;
        let answer = match tokio::time::timeout(self.prompt_timeout, child.wait_with_output()).await
        {
            Ok(Ok(output)) => parse_action(&String::from_utf8_lossy(&output.stdout)),
            Ok(Err(e)) => return Err(PortError::Unexpected(e.to_string())),
            Err(_) => None,
        };

        let state = match answer.as_deref() {
            Some("allow") => PermissionState::Granted,
            Some("block") => PermissionState::Denied,
            _ => {
                info!("Notification permission prompt dismissed");
                return Ok(PermissionState::Default);
            }
        };
        self.settings
            .put_setting(PERMISSION_SETTING, state.as_str())
            .await?;
        info!("Notification permission {}", state.as_str());
        Ok(state)
    }

    async fn show(&self, notification: Notification) -> PortResult<()> {
        if !self.available {
            return Err(PortError::PermissionDenied);
        }
        let child = self.spawn(&self.notify_args(&notification))?;
        let tag = notification.tag;
        let data = notification.data;
        let token = CancellationToken::new();
        if let Ok(mut live) = self.live.lock() {
            live.insert(tag, token.clone());
        }

        let live = self.live.clone();
        let interactions = self.interactions.clone();
        tokio::spawn(async move {
            tokio::select! {
                // Dropping the child kills the process, which closes the notification.
                _ = token.cancelled() => debug!("Notification {} closed", tag),
                output = child.wait_with_output() => match output {
                    Ok(output) => {
                        if let Some(action) = parse_action(&String::from_utf8_lossy(&output.stdout)) {
                            let action = (action != DEFAULT_ACTION).then_some(action);
                            let interaction = Interaction { tag: Some(tag), action, data };
                            if interactions.send(interaction).await.is_err() {
                                warn!("Interaction channel closed; dropping click on {}", tag);
                            }
                        }
                    }
                    Err(e) => warn!("Notification process for {} failed: {}", tag, e),
                },
            }
            if let Ok(mut live) = live.lock() {
                live.remove(&tag);
            }
        });
        Ok(())
    }

    async fn close(&self, tag: Uuid) -> PortResult<()> {
        let token = self.live.lock().ok().and_then(|mut live| live.remove(&tag));
        if let Some(token) = token {
            token.cancel();
        }
        Ok(())
    }
}
