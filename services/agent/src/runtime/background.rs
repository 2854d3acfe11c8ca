//! services/agent/src/runtime/background.rs
//!
//! The long-running side of the reminder system. It wakes on a recurring tick, on a
//! periodic-sync request, on its own activation and on deferred per-reminder triggers.
//! Every wake-up runs the same evaluation pass over a fresh snapshot of the store;
//! nothing about the schedule is remembered in memory between passes.

use chrono::NaiveDateTime;
use habit_reminder_core::domain::ReminderRecord;
use habit_reminder_core::evaluate::{evaluate, FireReason};
use habit_reminder_core::ports::{Clock, PortResult, ReminderStore};
use habit_reminder_core::schedule::{delay_until, next_wakeup};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::notifier::{Delivery, Notifier};
use super::triggers::{PendingTriggers, Wake};

/// The periodic-sync tag the runtime answers to.
pub const REMINDER_SYNC_TAG: &str = "reminder-sync";

const UNTRACKED_PREFIX: &str = "push:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Activation,
    Tick,
    PeriodicSync,
    Deferred,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiredReminder {
    pub habit_id: String,
    pub title: String,
    pub reason: FireReason,
    pub delivery: Option<Delivery>,
}

/// The result of one evaluation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub fired: Vec<FiredReminder>,
    /// Ids skipped because their schedule could not be parsed.
    pub rejected: Vec<String>,
}

pub struct BackgroundRuntime {
    store: Arc<dyn ReminderStore>,
    notifier: Notifier,
    clock: Arc<dyn Clock>,
    triggers: PendingTriggers,
    tick_interval: Duration,
    /// Serializes passes so two triggers cannot fire the same occurrence. Holds the
    /// occurrences shown this activation whose write-back failed, keyed by id.
    pass_lock: Mutex<HashMap<String, NaiveDateTime>>,
}

impl BackgroundRuntime {
    /// Returns the runtime and the receiving end of its deferred-trigger channel,
    /// which `run` consumes.
    pub fn new(
        store: Arc<dyn ReminderStore>,
        notifier: Notifier,
        clock: Arc<dyn Clock>,
        tick_interval: Duration,
        shutdown: &CancellationToken,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<Wake>) {
        let (wake_tx, wake_rx) = mpsc::unbounded_channel();
        let runtime = Arc::new(Self {
            store,
            notifier,
            clock,
            triggers: PendingTriggers::new(shutdown.child_token(), wake_tx),
            tick_interval,
            pass_lock: Mutex::new(HashMap::new()),
        });
        (runtime, wake_rx)
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Runs one pass. A storage read failure aborts the pass; a malformed record is
    /// skipped without affecting the others.
    pub async fn evaluate(&self, trigger: Trigger) -> PortResult<PassReport> {
        let mut unsaved = self.pass_lock.lock().await;
        let now = self.clock.now();

        let mut records = self.store.get_all().await.map_err(|e| {
            error!("Reminder pass ({:?}) aborted, store unreadable: {}", trigger, e);
            e
        })?;
        unsaved.retain(|id, _| records.iter().any(|r| &r.id == id));
        for record in records.iter_mut() {
            if let Some(&shown) = unsaved.get(&record.id) {
                mark_shown(record, shown);
            }
        }

        let evaluation = evaluate(now, &records);
        let mut report = PassReport::default();

        for rejected in evaluation.rejected {
            warn!("Skipping malformed reminder {}: {}", rejected.id, rejected.error);
            report.rejected.push(rejected.id);
        }

        for (fire, updated) in evaluation.fires.into_iter().zip(evaluation.updated) {
            match self.store.put(updated.clone()).await {
                Ok(()) => {
                    unsaved.remove(&fire.habit_id);
                }
                Err(e) => {
                    error!("Could not record fire of reminder {}: {}", fire.habit_id, e);
                    unsaved.insert(fire.habit_id.clone(), fire.at);
                }
            }

            let delivery = match self
                .notifier
                .show_reminder(Some(&fire.habit_id), &fire.title)
                .await
            {
                Ok(delivery) => Some(delivery),
                Err(e) => {
                    error!("Reminder '{}' could not be shown: {}", fire.title, e);
                    None
                }
            };
            info!(
                "Reminder '{}' fired ({:?}, {:?}) via {:?}",
                fire.title, fire.reason, trigger, delivery
            );

            self.arm(&updated);
            report.fired.push(FiredReminder {
                habit_id: fire.habit_id,
                title: fire.title,
                reason: fire.reason,
                delivery,
            });
        }

        if report.fired.is_empty() {
            debug!("Reminder pass ({:?}): nothing due", trigger);
        }
        Ok(report)
    }

    /// Answers a periodic-sync wake-up. Unknown tags are ignored.
    pub async fn sync(&self, tag: &str) -> PortResult<Option<PassReport>> {
        if tag != REMINDER_SYNC_TAG {
            debug!("Ignoring periodic sync for tag '{}'", tag);
            return Ok(None);
        }
        self.evaluate(Trigger::PeriodicSync).await.map(Some)
    }

    /// Installs the deferred trigger for the record's next wake-up, replacing any
    /// trigger already pending for it. Disabled records are disarmed.
    pub fn arm(&self, record: &ReminderRecord) {
        let now = self.clock.now();
        match next_wakeup(record, now) {
            Ok(Some(at)) => self.triggers.arm(
                &record.id,
                delay_until(now, at),
                Wake::Evaluate(record.id.clone()),
            ),
            Ok(None) => {
                self.triggers.disarm(&record.id);
            }
            Err(e) => {
                warn!("Not arming malformed reminder {}: {}", record.id, e);
                self.triggers.disarm(&record.id);
            }
        }
    }

    pub fn disarm(&self, id: &str) {
        self.triggers.disarm(id);
    }

    pub fn is_armed(&self, id: &str) -> bool {
        self.triggers.is_armed(id)
    }

    pub async fn arm_all(&self) -> PortResult<usize> {
        let records = self.store.get_all().await?;
        for record in &records {
            self.arm(record);
        }
        Ok(records.iter().filter(|r| r.enabled).count())
    }

    /// A one-shot re-show for a notification without a stored record.
    pub fn snooze_untracked(&self, title: &str, delay: Duration) {
        self.triggers.arm(
            &format!("{UNTRACKED_PREFIX}{title}"),
            delay,
            Wake::Show {
                title: title.to_string(),
            },
        );
    }

    async fn handle_wake(&self, wake: Wake) {
        match wake {
            Wake::Evaluate(id) => {
                debug!("Deferred trigger elapsed for {}", id);
                // Failures are already logged by the pass.
                let _ = self.evaluate(Trigger::Deferred).await;
            }
            Wake::Show { title } => {
                if let Err(e) = self.notifier.show_reminder(None, &title).await {
                    error!("Snoozed notification '{}' could not be shown: {}", title, e);
                }
            }
        }
    }

    /// The runtime's main loop. Runs the activation pass, arms every record, then
    /// serves ticks and deferred triggers until `shutdown` is cancelled.
    pub async fn run(
        self: Arc<Self>,
        mut wakes: mpsc::UnboundedReceiver<Wake>,
        shutdown: CancellationToken,
    ) {
        info!("Background runtime activated");
        let _ = self.evaluate(Trigger::Activation).await;
        match self.arm_all().await {
            Ok(count) => info!("Armed {} enabled reminders", count),
            Err(e) => error!("Could not arm reminders at activation: {}", e),
        }

        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick completes immediately; activation already covered it.
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                Some(wake) = wakes.recv() => self.handle_wake(wake).await,
                _ = ticker.tick() => {
                    let _ = self.evaluate(Trigger::Tick).await;
                }
            }
        }

        self.triggers.shutdown();
        info!("Background runtime stopped");
    }
}

/// Treats everything up to `shown` as handled, as if the fire had been written back.
fn mark_shown(record: &mut ReminderRecord, shown: NaiveDateTime) {
    record.handled_through = Some(record.handled_through.map_or(shown, |h| h.max(shown)));
    if record.snoozed_until.is_some_and(|until| until <= shown) {
        record.snoozed_until = None;
    }
}
