//! services/agent/src/runtime/triggers.rs
//!
//! One-shot deferred triggers, at most one pending per key. Arming a key cancels
//! the trigger already pending for it, so a superseded schedule never fires.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// What a deferred trigger asks the runtime to do when it elapses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Wake {
    /// Run an evaluation pass on behalf of this reminder id.
    Evaluate(String),
    /// Re-show a notification that has no stored record, such as a snoozed push.
    Show { title: String },
}

struct Pending {
    generation: u64,
    token: CancellationToken,
}

pub struct PendingTriggers {
    root: CancellationToken,
    wakes: mpsc::UnboundedSender<Wake>,
    pending: Arc<Mutex<HashMap<String, Pending>>>,
    generation: AtomicU64,
}

impl PendingTriggers {
    pub fn new(root: CancellationToken, wakes: mpsc::UnboundedSender<Wake>) -> Self {
        Self {
            root,
            wakes,
            pending: Arc::new(Mutex::new(HashMap::new())),
            generation: AtomicU64::new(0),
        }
    }

    pub fn arm(&self, key: &str, delay: Duration, wake: Wake) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let token = self.root.child_token();
        {
            let Ok(mut pending) = self.pending.lock() else {
                return;
            };
            let replaced = pending.insert(
                key.to_string(),
                Pending {
                    generation,
                    token: token.clone(),
                },
            );
            if let Some(previous) = replaced {
                previous.token.cancel();
            }
        }
        debug!("Armed trigger {} in {:?}", key, delay);

        let key = key.to_string();
        let pending = self.pending.clone();
        let wakes = self.wakes.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let current = pending
                        .lock()
                        .map(|mut pending| {
                            let current = pending
                                .get(&key)
                                .is_some_and(|p| p.generation == generation);
                            if current {
                                pending.remove(&key);
                            }
                            current
                        })
                        .unwrap_or(false);
                    if current {
                        // The receiver is gone only during shutdown.
                        let _ = wakes.send(wake);
                    }
                }
            }
        });
    }

    /// Returns whether a trigger was pending.
    pub fn disarm(&self, key: &str) -> bool {
        let removed = self
            .pending
            .lock()
            .ok()
            .and_then(|mut pending| pending.remove(key));
        match removed {
            Some(previous) => {
                previous.token.cancel();
                debug!("Disarmed trigger {}", key);
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self, key: &str) -> bool {
        self.pending
            .lock()
            .map(|pending| pending.contains_key(key))
            .unwrap_or(false)
    }

    pub fn shutdown(&self) {
        self.root.cancel();
        if let Ok(mut pending) = self.pending.lock() {
            pending.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triggers() -> (PendingTriggers, mpsc::UnboundedReceiver<Wake>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (PendingTriggers::new(CancellationToken::new(), tx), rx)
    }

    #[tokio::test]
    async fn elapsed_trigger_wakes_once() {
        let (triggers, mut rx) = triggers();
        triggers.arm("h1", Duration::from_millis(10), Wake::Evaluate("h1".into()));
        assert!(triggers.is_armed("h1"));

        assert_eq!(rx.recv().await, Some(Wake::Evaluate("h1".into())));
        assert!(!triggers.is_armed("h1"));
    }

    #[tokio::test]
    async fn re_arming_supersedes_the_pending_trigger() {
        let (triggers, mut rx) = triggers();
        triggers.arm("h1", Duration::from_millis(30), Wake::Show { title: "old".into() });
        triggers.arm("h1", Duration::from_millis(60), Wake::Show { title: "new".into() });

        assert_eq!(rx.recv().await, Some(Wake::Show { title: "new".into() }));
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn disarmed_trigger_never_fires() {
        let (triggers, mut rx) = triggers();
        triggers.arm("h1", Duration::from_millis(10), Wake::Evaluate("h1".into()));
        assert!(triggers.disarm("h1"));
        assert!(!triggers.disarm("h1"));

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let (triggers, mut rx) = triggers();
        triggers.arm("h1", Duration::from_millis(10), Wake::Evaluate("h1".into()));
        triggers.arm("h2", Duration::from_millis(20), Wake::Evaluate("h2".into()));

        assert_eq!(rx.recv().await, Some(Wake::Evaluate("h1".into())));
        assert_eq!(rx.recv().await, Some(Wake::Evaluate("h2".into())));
    }

    #[tokio::test]
    async fn shutdown_cancels_everything() {
        let (triggers, mut rx) = triggers();
        triggers.arm("h1", Duration::from_millis(10), Wake::Evaluate("h1".into()));
        triggers.shutdown();
        assert!(!triggers.is_armed("h1"));

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(rx.try_recv().is_err());
    }
}
