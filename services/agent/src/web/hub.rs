//! services/agent/src/web/hub.rs
//!
//! Tracks the app windows connected over WebSocket and implements the `AppWindows`
//! port on top of them.

use async_trait::async_trait;
use habit_reminder_core::domain::Toast;
use habit_reminder_core::ports::{AppWindows, PortError, PortResult};
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use super::protocol::ServerMessage;

/// Toasts kept for the next window while none is connected; the oldest go first.
pub const QUEUED_TOAST_LIMIT: usize = 20;

struct Window {
    id: Uuid,
    origin: String,
    sender: mpsc::UnboundedSender<ServerMessage>,
}

pub struct WindowHub {
    open_command: String,
    windows: Mutex<Vec<Window>>,
    queued: Mutex<VecDeque<Toast>>,
}

impl WindowHub {
    pub fn new(open_command: &str) -> Self {
        Self {
            open_command: open_command.to_string(),
            windows: Mutex::new(Vec::new()),
            queued: Mutex::new(VecDeque::new()),
        }
    }

    /// Adds a window and immediately hands it any toasts queued while none was open.
    /// Both happen under the window lock, so a concurrent toast is either queued and
    /// flushed here or sent to the new window directly.
    pub fn register(&self, url: &str) -> (Uuid, mpsc::UnboundedReceiver<ServerMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();

        if let Ok(mut windows) = self.windows.lock() {
            let queued: Vec<Toast> = self
                .queued
                .lock()
                .map(|mut q| q.drain(..).collect())
                .unwrap_or_default();
            for toast in queued {
                let _ = sender.send(ServerMessage::Toast { toast });
            }
            windows.push(Window {
                id,
                origin: url_origin(url),
                sender,
            });
        }
        info!("App window {} connected from {}", id, url);
        (id, receiver)
    }

    pub fn unregister(&self, id: Uuid) {
        if let Ok(mut windows) = self.windows.lock() {
            windows.retain(|w| w.id != id);
        }
        info!("App window {} disconnected", id);
    }

    pub fn window_count(&self) -> usize {
        self.windows.lock().map(|w| w.len()).unwrap_or(0)
    }

    pub fn queued_count(&self) -> usize {
        self.queued.lock().map(|q| q.len()).unwrap_or(0)
    }

    fn enqueue(&self, toast: Toast) {
        if let Ok(mut queued) = self.queued.lock() {
            if queued.len() == QUEUED_TOAST_LIMIT {
                queued.pop_front();
            }
            queued.push_back(toast);
        }
    }
}

/// Get the origin (scheme + host + port) from a URL string.
pub fn url_origin(url: &str) -> String {
    if let Some(scheme_end) = url.find("://") {
        let rest = &url[scheme_end + 3..];
        if let Some(slash) = rest.find('/') {
            return url[..scheme_end + 3 + slash].to_string();
        }
    }
    url.trim_end_matches('/').to_string()
}

#[async_trait]
impl AppWindows for WindowHub {
    async fn show_in_app(&self, toast: Toast) -> PortResult<()> {
        let mut windows = self
            .windows
            .lock()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        windows.retain(|w| {
            w.sender
                .send(ServerMessage::Toast {
                    toast: toast.clone(),
                })
                .is_ok()
        });

        // Lock order is windows, then queued.
        if windows.is_empty() {
            debug!("No app window open; queueing toast");
            self.enqueue(toast);
        }
        Ok(())
    }

    async fn focus_or_open(&self, url: &str) -> PortResult<()> {
        let origin = url_origin(url);
        let focused = self
            .windows
            .lock()
            .map(|windows| {
                windows
                    .iter()
                    .rev()
                    .filter(|w| w.origin == origin)
                    .any(|w| w.sender.send(ServerMessage::Focus).is_ok())
            })
            .unwrap_or(false);
        if focused {
            return Ok(());
        }

        info!("No app window on {}; opening {}", origin, url);
        let status = Command::new(&self.open_command)
            .arg(url)
            .status()
            .await
            .map_err(|e| PortError::Unexpected(format!("failed to run {}: {e}", self.open_command)))?;
        if !status.success() {
            return Err(PortError::Unexpected(format!(
                "{} exited with {status}",
                self.open_command
            )));
        }
        Ok(())
    }
}
