pub mod background;
pub mod controller;
pub mod dispatcher;
pub mod notifier;
pub mod permission;
pub mod triggers;

pub use background::{BackgroundRuntime, PassReport, Trigger, REMINDER_SYNC_TAG};
pub use controller::{ControllerError, ReminderController, ReminderInput, SaveOutcome};
pub use dispatcher::{ActionDispatcher, DispatchOutcome};
pub use notifier::{Delivery, Notifier};
pub use permission::PermissionGate;
