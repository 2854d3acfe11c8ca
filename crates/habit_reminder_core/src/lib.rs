pub mod domain;
pub mod evaluate;
pub mod memory;
pub mod ports;
pub mod schedule;

pub use domain::{
    Frequency, Interaction, InteractionKind, Notification, NotificationAction, NotificationData,
    PermissionOutcome, PermissionState, PushPayload, ReminderRecord, ReminderRegistration,
    Session, Toast, ToastSeverity,
};
pub use evaluate::{evaluate, Evaluation, Fire, FireReason};
pub use ports::{
    AppWindows, Clock, HabitBackend, NotificationPlatform, PortError, PortResult, ReminderStore,
    SessionStore, SettingsStore,
};
pub use schedule::{next_delay, next_fire, next_wakeup, Schedule, ScheduleError};
