//! services/agent/src/web/ws_handler.rs
//!
//! The control loop for one app window's WebSocket connection. The window receives
//! toasts and focus requests, and reports clicks on toasts back to the dispatcher.

use crate::web::{
    protocol::{ClientMessage, ServerMessage},
    state::AppState,
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use habit_reminder_core::domain::Interaction;
use std::sync::Arc;
use tracing::{error, info, warn};

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(ws: WebSocketUpgrade, State(app_state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state))
}

fn encode(message: &ServerMessage) -> Option<Message> {
    match serde_json::to_string(message) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            error!("Failed to serialize server message: {}", e);
            None
        }
    }
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>) {
    let (mut ws_sender, mut receiver) = socket.split();

    // --- 1. Initialization Phase ---
    let url = match receiver.next().await {
        Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientMessage>(text.as_str()) {
            Ok(ClientMessage::Hello { url }) => url,
            _ => {
                warn!("First message was not a valid hello message.");
                if let Some(msg) = encode(&ServerMessage::Error {
                    message: "Expected a hello message first.".to_string(),
                }) {
                    let _ = ws_sender.send(msg).await;
                }
                return;
            }
        },
        _ => {
            info!("Window disconnected before saying hello.");
            return;
        }
    };

    let (window_id, mut outbound) = app_state.hub.register(&url);
    if let Some(msg) = encode(&ServerMessage::Registered { window_id }) {
        if ws_sender.send(msg).await.is_err() {
            app_state.hub.unregister(window_id);
            return;
        }
    }

    // --- 2. Main Loop ---
    loop {
        tokio::select! {
            Some(message) = outbound.recv() => {
                let Some(msg) = encode(&message) else { continue };
                if ws_sender.send(msg).await.is_err() {
                    warn!("Failed to send to window {}; closing.", window_id);
                    break;
                }
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => handle_text_message(text.as_str(), &app_state).await,
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("WebSocket error on window {}: {}", window_id, e);
                    break;
                }
            },
        }
    }

    app_state.hub.unregister(window_id);
}

async fn handle_text_message(text: &str, app_state: &Arc<AppState>) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::NotificationClicked { action, data }) => {
            let outcome = app_state
                .dispatcher
                .dispatch(Interaction {
                    tag: None,
                    action,
                    data,
                })
                .await;
            info!("Toast interaction handled: {:?}", outcome);
        }
        Ok(ClientMessage::Hello { .. }) => {
            warn!("Received subsequent hello message, which is ignored.");
        }
        Err(e) => {
            warn!("Failed to deserialize client message: {}", e);
        }
    }
}
