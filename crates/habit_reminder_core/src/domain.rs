//! crates/habit_reminder_core/src/domain.rs
//!
//! Defines the core data structures of the reminder subsystem.
//! Persistence and transport formats live in the adapters; these types only carry
//! serde derives so records cross the store and window boundaries unchanged.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// Notification Visual Identity
//=========================================================================================

pub const REMINDER_TITLE: &str = "Habit Reminder";
pub const REMINDER_ICON: &str = "/reminder-icon.png";
pub const REMINDER_BADGE: &str = "/badge-icon.png";
pub const PUSH_ICON: &str = "/icon.png";
pub const VIBRATE_PATTERN: [u32; 3] = [200, 100, 200];

/// Time used when a habit turns reminders on without picking a time.
pub const DEFAULT_REMINDER_TIME: &str = "08:00";

//=========================================================================================
// Reminder Records
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Custom,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "custom" => Ok(Self::Custom),
            other => Err(format!("unknown frequency '{other}'")),
        }
    }
}

/// A persisted reminder for one habit, keyed by the habit's identifier.
///
/// `time` and `days` are kept exactly as entered; the scheduler parses them on
/// every evaluation and skips the record when they are malformed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderRecord {
    pub id: String,
    pub title: String,
    /// Local wall-clock `HH:MM`, 24-hour.
    pub time: String,
    /// Weekday names, only consulted when `frequency` is not daily.
    #[serde(default)]
    pub days: Vec<String>,
    pub frequency: Frequency,
    pub enabled: bool,
    /// Occurrences at or before this instant have already been handled.
    #[serde(default)]
    pub handled_through: Option<NaiveDateTime>,
    /// A pending one-shot snooze. Never changes `time` or `days`.
    #[serde(default)]
    pub snoozed_until: Option<NaiveDateTime>,
}

impl ReminderRecord {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        time: impl Into<String>,
        frequency: Frequency,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            time: time.into(),
            days: Vec::new(),
            frequency,
            enabled: true,
            handled_through: None,
            snoozed_until: None,
        }
    }

    pub fn with_days<I, S>(mut self, days: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.days = days.into_iter().map(Into::into).collect();
        self
    }
}

/// What the backend is told when a reminder is registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderRegistration {
    pub title: String,
    pub time: String,
    pub days: Vec<String>,
    pub frequency: Frequency,
    pub user_id: Option<String>,
}

impl From<&ReminderRecord> for ReminderRegistration {
    fn from(record: &ReminderRecord) -> Self {
        Self {
            title: record.title.clone(),
            time: record.time.clone(),
            days: record.days.clone(),
            frequency: record.frequency,
            user_id: None,
        }
    }
}

// Represents the signed-in foreground session, mirrored for background use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub user_id: Option<String>,
}

//=========================================================================================
// Permission
//=========================================================================================

/// The host platform's notification permission, as last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    /// Not decided yet; the user may be prompted once.
    Default,
    Granted,
    Denied,
    Unsupported,
}

impl PermissionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Granted => "granted",
            Self::Denied => "denied",
            Self::Unsupported => "unsupported",
        }
    }
}

impl FromStr for PermissionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(Self::Default),
            "granted" => Ok(Self::Granted),
            "denied" => Ok(Self::Denied),
            "unsupported" => Ok(Self::Unsupported),
            other => Err(format!("unknown permission state '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionOutcome {
    Granted,
    Denied,
    Unsupported,
}

impl PermissionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Granted => "granted",
            Self::Denied => "denied",
            Self::Unsupported => "unsupported",
        }
    }
}

//=========================================================================================
// Notifications
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationAction {
    Complete,
    Snooze,
}

impl NotificationAction {
    /// The action identifier reported back when the button is pressed.
    pub fn id(&self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Snooze => "snooze",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Complete => "Mark Complete",
            Self::Snooze => "Snooze",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "complete" => Some(Self::Complete),
            "snooze" => Some(Self::Snooze),
            _ => None,
        }
    }
}

/// The payload every notification carries, so an interaction always names its own habit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    pub habit_id: Option<String>,
    pub habit_title: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub tag: Uuid,
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: Option<String>,
    pub vibrate: Vec<u32>,
    pub actions: Vec<NotificationAction>,
    pub data: NotificationData,
}

impl Notification {
    /// A locally scheduled reminder with the fixed visual identity and both actions.
    pub fn reminder(habit_id: Option<&str>, habit_title: &str, timestamp: i64) -> Self {
        Self {
            tag: Uuid::new_v4(),
            title: REMINDER_TITLE.to_string(),
            body: format!("Time for {habit_title}!"),
            icon: REMINDER_ICON.to_string(),
            badge: Some(REMINDER_BADGE.to_string()),
            vibrate: VIBRATE_PATTERN.to_vec(),
            actions: vec![NotificationAction::Complete, NotificationAction::Snooze],
            data: NotificationData {
                habit_id: habit_id.map(str::to_string),
                habit_title: habit_title.to_string(),
                timestamp,
            },
        }
    }

    /// A notification delivered by push; the push itself is the due signal.
    pub fn push(payload: &PushPayload, timestamp: i64) -> Self {
        Self {
            tag: Uuid::new_v4(),
            title: payload.notification.title.clone(),
            body: payload.notification.body.clone(),
            icon: PUSH_ICON.to_string(),
            badge: None,
            vibrate: Vec::new(),
            actions: Vec::new(),
            data: NotificationData {
                habit_id: None,
                habit_title: payload.notification.title.clone(),
                timestamp,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushNotification {
    pub title: String,
    pub body: String,
}

/// Inbound push message shape: `{ notification: { title, body } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushPayload {
    pub notification: PushNotification,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionKind {
    Complete,
    Snooze,
    /// A bare click, or any action that is not recognized.
    Open,
}

/// A user's interaction with a shown notification or in-app toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interaction {
    /// The notification to close; toasts have none.
    pub tag: Option<Uuid>,
    pub action: Option<String>,
    pub data: NotificationData,
}

impl Interaction {
    pub fn kind(&self) -> InteractionKind {
        match self.action.as_deref().and_then(NotificationAction::from_id) {
            Some(NotificationAction::Complete) => InteractionKind::Complete,
            Some(NotificationAction::Snooze) => InteractionKind::Snooze,
            None => InteractionKind::Open,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastSeverity {
    Info,
    /// The system notification was attempted and failed.
    Warning,
}

/// The in-app substitute for a system notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toast {
    pub message: String,
    pub severity: ToastSeverity,
    pub data: Option<NotificationData>,
}
