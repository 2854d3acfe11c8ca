mod common;

use agent_lib::runtime::{BackgroundRuntime, Delivery, Notifier, Trigger, REMINDER_SYNC_TAG};
use async_trait::async_trait;
use common::{at, FakePlatform, FakeWindows, FixedClock, Harness};
use habit_reminder_core::domain::{Frequency, PermissionState, ReminderRecord, ToastSeverity};
use habit_reminder_core::memory::InMemoryReminderStore;
use habit_reminder_core::ports::{PortError, PortResult, ReminderStore};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn daily(id: &str, title: &str, time: &str) -> ReminderRecord {
    let mut record = ReminderRecord::new(id, title, time, Frequency::Daily);
    record.handled_through = Some(at(11, 23, 0));
    record
}

#[tokio::test]
async fn daily_reminder_fires_once_per_day() {
    let harness = Harness::granted(at(12, 7, 59));
    harness.store.put(daily("h1", "Meditate", "08:00")).await.unwrap();

    let report = harness.runtime.evaluate(Trigger::Tick).await.unwrap();
    assert!(report.fired.is_empty());

    harness.clock.set(at(12, 8, 0));
    let report = harness.runtime.evaluate(Trigger::Tick).await.unwrap();
    assert_eq!(report.fired.len(), 1);
    assert_eq!(report.fired[0].delivery, Some(Delivery::System));

    for later in [at(12, 8, 1), at(12, 13, 0), at(12, 23, 59), at(13, 7, 59)] {
        harness.clock.set(later);
        let report = harness.runtime.evaluate(Trigger::Tick).await.unwrap();
        assert!(report.fired.is_empty(), "fired again at {later}");
    }

    harness.clock.set(at(13, 8, 0));
    let report = harness.runtime.evaluate(Trigger::Tick).await.unwrap();
    assert_eq!(report.fired.len(), 1);

    let shown = harness.platform.shown();
    assert_eq!(shown.len(), 2);
    assert_eq!(shown[0].title, "Habit Reminder");
    assert_eq!(shown[0].body, "Time for Meditate!");
    assert_eq!(shown[0].data.habit_id.as_deref(), Some("h1"));
}

#[tokio::test]
async fn triggers_share_one_evaluation() {
    let harness = Harness::granted(at(12, 8, 0));
    harness.store.put(daily("h1", "Meditate", "08:00")).await.unwrap();

    let (a, b) = tokio::join!(
        harness.runtime.evaluate(Trigger::Tick),
        harness.runtime.sync(REMINDER_SYNC_TAG),
    );
    let fired = a.unwrap().fired.len() + b.unwrap().unwrap().fired.len();
    assert_eq!(fired, 1);
    assert_eq!(harness.platform.shown().len(), 1);
}

#[tokio::test]
async fn disabled_reminders_are_skipped_and_kept() {
    let harness = Harness::granted(at(12, 8, 0));
    let mut record = daily("h1", "Meditate", "08:00");
    record.enabled = false;
    harness.store.put(record.clone()).await.unwrap();

    let report = harness.runtime.evaluate(Trigger::Tick).await.unwrap();
    assert!(report.fired.is_empty());
    assert!(harness.store.get("h1").await.unwrap().is_some());

    record.enabled = true;
    harness.store.put(record).await.unwrap();
    let report = harness.runtime.evaluate(Trigger::Tick).await.unwrap();
    assert_eq!(report.fired.len(), 1);
}

#[tokio::test]
async fn malformed_records_do_not_block_the_others() {
    let harness = Harness::granted(at(12, 8, 0));
    harness.store.put(daily("bad", "Broken", "25:00")).await.unwrap();
    harness
        .store
        .put(
            ReminderRecord::new("odd", "Odd days", "08:00", Frequency::Custom)
                .with_days(["Someday"]),
        )
        .await
        .unwrap();
    harness.store.put(daily("h1", "Meditate", "08:00")).await.unwrap();

    let report = harness.runtime.evaluate(Trigger::Tick).await.unwrap();
    assert_eq!(report.fired.len(), 1);
    assert_eq!(report.fired[0].habit_id, "h1");
    let mut rejected = report.rejected.clone();
    rejected.sort();
    assert_eq!(rejected, ["bad", "odd"]);
}

#[tokio::test]
async fn unreadable_store_aborts_the_pass() {
    let harness = Harness::granted(at(12, 8, 0));
    harness.store.put(daily("h1", "Meditate", "08:00")).await.unwrap();
    harness.store.set_unavailable(true);

    let result = harness.runtime.evaluate(Trigger::Tick).await;
    assert!(matches!(result, Err(PortError::Storage(_))));
    assert!(harness.platform.shown().is_empty());

    harness.store.set_unavailable(false);
    let report = harness.runtime.evaluate(Trigger::Tick).await.unwrap();
    assert_eq!(report.fired.len(), 1);
}

/// Reads succeed, every write fails.
struct FullStore(InMemoryReminderStore);

#[async_trait]
impl ReminderStore for FullStore {
    async fn put(&self, _record: ReminderRecord) -> PortResult<()> {
        Err(PortError::Storage("quota exceeded".into()))
    }

    async fn get(&self, id: &str) -> PortResult<Option<ReminderRecord>> {
        self.0.get(id).await
    }

    async fn get_all(&self) -> PortResult<Vec<ReminderRecord>> {
        self.0.get_all().await
    }

    async fn delete(&self, id: &str) -> PortResult<()> {
        self.0.delete(id).await
    }
}

#[tokio::test]
async fn failed_write_back_does_not_refire_the_same_occurrence() {
    let inner = InMemoryReminderStore::open();
    inner.put(daily("h1", "Meditate", "08:00")).await.unwrap();
    let platform = Arc::new(FakePlatform::new(PermissionState::Granted));
    let clock = Arc::new(FixedClock::new(at(12, 8, 0)));
    let notifier = Notifier::new(platform.clone(), Arc::new(FakeWindows::default()), clock.clone());
    let shutdown = CancellationToken::new();
    let (runtime, _wakes) = BackgroundRuntime::new(
        Arc::new(FullStore(inner)),
        notifier,
        clock.clone(),
        Duration::from_secs(60),
        &shutdown,
    );

    let mut fired = 0;
    for minute in 0..5 {
        clock.set(at(12, 8, minute));
        fired += runtime.evaluate(Trigger::Tick).await.unwrap().fired.len();
    }
    assert_eq!(fired, 1);
    assert_eq!(platform.shown().len(), 1);

    clock.set(at(13, 8, 0));
    assert_eq!(runtime.evaluate(Trigger::Tick).await.unwrap().fired.len(), 1);
    shutdown.cancel();
}

#[tokio::test]
async fn denied_permission_falls_back_to_a_toast() {
    let harness = Harness::new(FakePlatform::new(PermissionState::Denied), at(12, 8, 0));
    harness.store.put(daily("h1", "Meditate", "08:00")).await.unwrap();

    let report = harness.runtime.evaluate(Trigger::Tick).await.unwrap();
    assert_eq!(report.fired[0].delivery, Some(Delivery::InApp));
    assert!(harness.platform.shown().is_empty());

    let toasts = harness.windows.toasts();
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].message, "Habit Reminder: Time for Meditate!");
    assert_eq!(toasts[0].data.as_ref().unwrap().habit_title, "Meditate");
    assert_eq!(toasts[0].severity, ToastSeverity::Info);
}

#[tokio::test]
async fn failed_system_notification_falls_back_to_a_toast() {
    let platform = FakePlatform::new(PermissionState::Granted);
    *platform.fail_show.lock().unwrap() = true;
    let harness = Harness::new(platform, at(12, 8, 0));
    harness.store.put(daily("h1", "Meditate", "08:00")).await.unwrap();

    let report = harness.runtime.evaluate(Trigger::Tick).await.unwrap();
    assert_eq!(report.fired[0].delivery, Some(Delivery::InApp));
    let toasts = harness.windows.toasts();
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].severity, ToastSeverity::Warning);
}

#[tokio::test]
async fn weekly_reminder_fires_only_on_its_days() {
    // The 13th is a Tuesday, the 14th a Wednesday.
    let harness = Harness::granted(at(13, 9, 0));
    let mut record = ReminderRecord::new("h2", "Run", "09:00", Frequency::Weekly)
        .with_days(["Monday", "Wednesday"]);
    record.handled_through = Some(at(12, 23, 0));
    harness.store.put(record).await.unwrap();

    let report = harness.runtime.evaluate(Trigger::Tick).await.unwrap();
    assert!(report.fired.is_empty());

    harness.clock.set(at(14, 9, 0));
    let report = harness.runtime.evaluate(Trigger::Tick).await.unwrap();
    assert_eq!(report.fired.len(), 1);
}

#[tokio::test]
async fn unknown_sync_tags_are_ignored() {
    let harness = Harness::granted(at(12, 8, 0));
    harness.store.put(daily("h1", "Meditate", "08:00")).await.unwrap();

    assert_eq!(harness.runtime.sync("content-sync").await.unwrap(), None);
    assert!(harness.platform.shown().is_empty());

    let report = harness.runtime.sync(REMINDER_SYNC_TAG).await.unwrap().unwrap();
    assert_eq!(report.fired.len(), 1);
}

#[tokio::test]
async fn run_evaluates_on_activation_and_stops_on_shutdown() {
    let mut harness = Harness::granted(at(12, 8, 0));
    harness.store.put(daily("h1", "Meditate", "08:00")).await.unwrap();
    harness.store.put(daily("h2", "Read", "21:00")).await.unwrap();

    let wakes = harness.wakes.take().unwrap();
    let task = tokio::spawn(harness.runtime.clone().run(wakes, harness.shutdown.clone()));

    for _ in 0..50 {
        if harness.runtime.is_armed("h2") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(harness.runtime.is_armed("h1"));
    assert!(harness.runtime.is_armed("h2"));
    let shown = harness.platform.shown();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].body, "Time for Meditate!");

    harness.shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("runtime did not stop")
        .unwrap();
    assert!(!harness.runtime.is_armed("h1"));
}
