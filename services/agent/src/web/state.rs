//! services/agent/src/web/state.rs
//!
//! Defines the application's shared state and the wiring that builds it.

use crate::config::Config;
use crate::runtime::triggers::Wake;
use crate::runtime::{
    ActionDispatcher, BackgroundRuntime, Notifier, PermissionGate, ReminderController,
};
use crate::web::hub::WindowHub;
use habit_reminder_core::domain::Interaction;
use habit_reminder_core::ports::{
    Clock, HabitBackend, NotificationPlatform, ReminderStore, SessionStore, SettingsStore,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// The ports the agent is assembled from. The binary passes real adapters; tests pass fakes.
#[derive(Clone)]
pub struct Ports {
    pub store: Arc<dyn ReminderStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub settings: Arc<dyn SettingsStore>,
    pub platform: Arc<dyn NotificationPlatform>,
    pub backend: Arc<dyn HabitBackend>,
    pub clock: Arc<dyn Clock>,
}

//=========================================================================================
// AppState (Shared Across All Handlers)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub controller: ReminderController,
    pub runtime: Arc<BackgroundRuntime>,
    pub dispatcher: ActionDispatcher,
    pub hub: Arc<WindowHub>,
}

impl AppState {
    /// Wires the runtime, dispatcher and controller around the given ports and hub.
    /// The returned receiver must be handed to `BackgroundRuntime::run`.
    pub fn assemble(
        ports: Ports,
        hub: Arc<WindowHub>,
        config: Arc<Config>,
        shutdown: &CancellationToken,
    ) -> (Self, mpsc::UnboundedReceiver<Wake>) {
        let notifier = Notifier::new(ports.platform.clone(), hub.clone(), ports.clock.clone());
        let (runtime, wakes) = BackgroundRuntime::new(
            ports.store.clone(),
            notifier,
            ports.clock.clone(),
            config.tick_interval,
            shutdown,
        );
        let dispatcher = ActionDispatcher::new(
            ports.platform.clone(),
            hub.clone(),
            ports.sessions.clone(),
            ports.backend.clone(),
            ports.store.clone(),
            runtime.clone(),
            ports.clock.clone(),
            &config.app_url,
            config.snooze,
        );
        let controller = ReminderController::new(
            ports.store,
            ports.sessions,
            ports.settings,
            ports.backend,
            PermissionGate::new(ports.platform),
            runtime.clone(),
            ports.clock,
        );

        let state = Self {
            config,
            controller,
            runtime,
            dispatcher,
            hub,
        };
        (state, wakes)
    }

    /// Forwards platform interactions to the dispatcher in the background.
    pub fn spawn_dispatcher(&self, interactions: mpsc::Receiver<Interaction>) {
        tokio::spawn(self.dispatcher.clone().serve(interactions));
    }
}
