//! crates/habit_reminder_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the reminder core.
//! These traits form the boundary of the hexagonal architecture: the foreground
//! controller and the background runtime both receive them injected, so tests can
//! substitute in-memory fakes for the real store, platform and backend.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::domain::{
    Notification, PermissionState, ReminderRecord, ReminderRegistration, Session, Toast,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// The error type shared by every port operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// Local persistence is unavailable or out of quota.
    #[error("Storage unavailable: {0}")]
    Storage(String),
    #[error("Notification permission denied")]
    PermissionDenied,
    /// No bearer token is stored; network-bound actions stop here and are not retried.
    #[error("No authentication token available")]
    AuthMissing,
    /// The backend call failed or returned an error status. Never retried.
    #[error("Network failure: {0}")]
    Network(String),
    #[error("Malformed reminder {id}: {reason}")]
    MalformedRecord { id: String, reason: String },
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Persistence Ports
//=========================================================================================

/// Durable key/value table of reminder records, shared by both execution contexts.
///
/// Every write replaces the whole record atomically; `get_all` is a snapshot.
#[async_trait]
pub trait ReminderStore: Send + Sync {
    /// Upsert by `record.id`.
    async fn put(&self, record: ReminderRecord) -> PortResult<()>;

    async fn get(&self, id: &str) -> PortResult<Option<ReminderRecord>>;

    async fn get_all(&self) -> PortResult<Vec<ReminderRecord>>;

    /// Removing an absent id is not an error.
    async fn delete(&self, id: &str) -> PortResult<()>;
}

/// The single-value area holding the bearer token for background use.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load_session(&self) -> PortResult<Option<Session>>;

    async fn save_session(&self, session: Session) -> PortResult<()>;

    async fn clear_session(&self) -> PortResult<()>;
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_setting(&self, key: &str) -> PortResult<Option<String>>;

    async fn put_setting(&self, key: &str, value: &str) -> PortResult<()>;
}

//=========================================================================================
// Platform Ports
//=========================================================================================

/// The host's system notification capability.
#[async_trait]
pub trait NotificationPlatform: Send + Sync {
    /// The current permission state. Never prompts.
    async fn permission(&self) -> PortResult<PermissionState>;

    /// Prompts the user. Callers only invoke this while the state is `Default`.
    async fn request_permission(&self) -> PortResult<PermissionState>;

    /// Returns once the notification has been requested, not once it is dismissed.
    async fn show(&self, notification: Notification) -> PortResult<()>;

    /// Closing a notification that is no longer shown is a no-op.
    async fn close(&self, tag: Uuid) -> PortResult<()>;
}

/// The app's own windows: the in-page fallback surface and the target of "open app".
#[async_trait]
pub trait AppWindows: Send + Sync {
    async fn show_in_app(&self, toast: Toast) -> PortResult<()>;

    /// Focuses an existing window on the same origin as `url`, or opens a new one.
    async fn focus_or_open(&self, url: &str) -> PortResult<()>;
}

//=========================================================================================
// Backend and Clock Ports
//=========================================================================================

/// The authenticated REST backend, consumed as an opaque HTTP API.
#[async_trait]
pub trait HabitBackend: Send + Sync {
    /// Marks today's completion for the named habit.
    async fn complete_habit(&self, token: &str, title: &str) -> PortResult<()>;

    async fn register_reminder(
        &self,
        token: &str,
        registration: &ReminderRegistration,
    ) -> PortResult<()>;

    /// Records that notifications were granted for this device.
    async fn save_notification_token(
        &self,
        bearer: Option<&str>,
        user_id: Option<&str>,
        device_token: &str,
    ) -> PortResult<()>;
}

/// Local wall-clock time, injectable so schedules can be tested at fixed instants.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    /// Milliseconds since the Unix epoch, stamped into notification data.
    fn timestamp_ms(&self) -> i64;
}
