#![allow(dead_code)]

use agent_lib::config::Config;
use agent_lib::runtime::triggers::Wake;
use agent_lib::runtime::{
    ActionDispatcher, BackgroundRuntime, Notifier, PermissionGate, ReminderController,
};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use habit_reminder_core::domain::{
    Notification, PermissionState, ReminderRegistration, Session, Toast,
};
use habit_reminder_core::memory::{InMemoryReminderStore, InMemorySessionStore};
use habit_reminder_core::ports::{
    AppWindows, Clock, HabitBackend, NotificationPlatform, PortError, PortResult,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// 2026-10-12 is a Monday.
pub fn at(day: u32, hh: u32, mm: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 10, day)
        .unwrap()
        .and_hms_opt(hh, mm, 0)
        .unwrap()
}

//=========================================================================================
// Clock
//=========================================================================================

pub struct FixedClock {
    now: Mutex<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::from_std(by).unwrap();
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap()
    }

    fn timestamp_ms(&self) -> i64 {
        self.now().and_utc().timestamp_millis()
    }
}

//=========================================================================================
// Notification Platform
//=========================================================================================

pub struct FakePlatform {
    pub state: Mutex<PermissionState>,
    /// What the user answers when prompted.
    pub answer: Mutex<PermissionState>,
    pub prompts: Mutex<usize>,
    pub shown: Mutex<Vec<Notification>>,
    pub closed: Mutex<Vec<Uuid>>,
    pub fail_show: Mutex<bool>,
}

impl FakePlatform {
    pub fn new(state: PermissionState) -> Self {
        Self {
            state: Mutex::new(state),
            answer: Mutex::new(PermissionState::Granted),
            prompts: Mutex::new(0),
            shown: Mutex::new(Vec::new()),
            closed: Mutex::new(Vec::new()),
            fail_show: Mutex::new(false),
        }
    }

    pub fn answering(self, answer: PermissionState) -> Self {
        *self.answer.lock().unwrap() = answer;
        self
    }

    pub fn prompts(&self) -> usize {
        *self.prompts.lock().unwrap()
    }

    pub fn shown(&self) -> Vec<Notification> {
        self.shown.lock().unwrap().clone()
    }

    pub fn closed(&self) -> Vec<Uuid> {
        self.closed.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationPlatform for FakePlatform {
    async fn permission(&self) -> PortResult<PermissionState> {
        Ok(*self.state.lock().unwrap())
    }

    async fn request_permission(&self) -> PortResult<PermissionState> {
        *self.prompts.lock().unwrap() += 1;
        let answer = *self.answer.lock().unwrap();
        if answer != PermissionState::Default {
            *self.state.lock().unwrap() = answer;
        }
        Ok(answer)
    }

    async fn show(&self, notification: Notification) -> PortResult<()> {
        if *self.fail_show.lock().unwrap() {
            return Err(PortError::Unexpected("display server gone".into()));
        }
        self.shown.lock().unwrap().push(notification);
        Ok(())
    }

    async fn close(&self, tag: Uuid) -> PortResult<()> {
        self.closed.lock().unwrap().push(tag);
        Ok(())
    }
}

//=========================================================================================
// App Windows
//=========================================================================================

#[derive(Default)]
pub struct FakeWindows {
    pub toasts: Mutex<Vec<Toast>>,
    pub opened: Mutex<Vec<String>>,
}

impl FakeWindows {
    pub fn toasts(&self) -> Vec<Toast> {
        self.toasts.lock().unwrap().clone()
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl AppWindows for FakeWindows {
    async fn show_in_app(&self, toast: Toast) -> PortResult<()> {
        self.toasts.lock().unwrap().push(toast);
        Ok(())
    }

    async fn focus_or_open(&self, url: &str) -> PortResult<()> {
        self.opened.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

//=========================================================================================
// Backend
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Complete {
        token: String,
        title: String,
    },
    Register {
        token: String,
        registration: ReminderRegistration,
    },
    SaveToken {
        bearer: Option<String>,
        user_id: Option<String>,
        device_token: String,
    },
}

#[derive(Default)]
pub struct FakeBackend {
    pub calls: Mutex<Vec<BackendCall>>,
    pub offline: Mutex<bool>,
}

impl FakeBackend {
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn go_offline(&self) {
        *self.offline.lock().unwrap() = true;
    }

    fn record(&self, call: BackendCall) -> PortResult<()> {
        self.calls.lock().unwrap().push(call);
        if *self.offline.lock().unwrap() {
            return Err(PortError::Network("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl HabitBackend for FakeBackend {
    async fn complete_habit(&self, token: &str, title: &str) -> PortResult<()> {
        self.record(BackendCall::Complete {
            token: token.into(),
            title: title.into(),
        })
    }

    async fn register_reminder(
        &self,
        token: &str,
        registration: &ReminderRegistration,
    ) -> PortResult<()> {
        self.record(BackendCall::Register {
            token: token.into(),
            registration: registration.clone(),
        })
    }

    async fn save_notification_token(
        &self,
        bearer: Option<&str>,
        user_id: Option<&str>,
        device_token: &str,
    ) -> PortResult<()> {
        self.record(BackendCall::SaveToken {
            bearer: bearer.map(str::to_string),
            user_id: user_id.map(str::to_string),
            device_token: device_token.into(),
        })
    }
}

//=========================================================================================
// Harness
//=========================================================================================

/// Every runtime component wired to fakes, sharing one store and one clock.
pub struct Harness {
    pub store: Arc<InMemoryReminderStore>,
    pub sessions: Arc<InMemorySessionStore>,
    pub platform: Arc<FakePlatform>,
    pub windows: Arc<FakeWindows>,
    pub backend: Arc<FakeBackend>,
    pub clock: Arc<FixedClock>,
    pub runtime: Arc<BackgroundRuntime>,
    pub wakes: Option<mpsc::UnboundedReceiver<Wake>>,
    pub dispatcher: ActionDispatcher,
    pub controller: ReminderController,
    pub shutdown: CancellationToken,
}

impl Harness {
    pub fn new(platform: FakePlatform, now: NaiveDateTime) -> Self {
        let config = Config::default();
        let store = Arc::new(InMemoryReminderStore::open());
        let sessions = Arc::new(InMemorySessionStore::open());
        let platform = Arc::new(platform);
        let windows = Arc::new(FakeWindows::default());
        let backend = Arc::new(FakeBackend::default());
        let clock = Arc::new(FixedClock::new(now));
        let shutdown = CancellationToken::new();

        let notifier = Notifier::new(platform.clone(), windows.clone(), clock.clone());
        let (runtime, wakes) = BackgroundRuntime::new(
            store.clone(),
            notifier,
            clock.clone(),
            config.tick_interval,
            &shutdown,
        );
        let dispatcher = ActionDispatcher::new(
            platform.clone(),
            windows.clone(),
            sessions.clone(),
            backend.clone(),
            store.clone(),
            runtime.clone(),
            clock.clone(),
            &config.app_url,
            config.snooze,
        );
        let controller = ReminderController::new(
            store.clone(),
            sessions.clone(),
            sessions.clone(),
            backend.clone(),
            PermissionGate::new(platform.clone()),
            runtime.clone(),
            clock.clone(),
        );

        Self {
            store,
            sessions,
            platform,
            windows,
            backend,
            clock,
            runtime,
            wakes: Some(wakes),
            dispatcher,
            controller,
            shutdown,
        }
    }

    pub fn granted(now: NaiveDateTime) -> Self {
        Self::new(FakePlatform::new(PermissionState::Granted), now)
    }

    pub async fn sign_in(&self, token: &str) {
        use habit_reminder_core::ports::SessionStore;
        self.sessions
            .save_session(Session {
                token: token.into(),
                user_id: Some("u1".into()),
            })
            .await
            .unwrap();
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
