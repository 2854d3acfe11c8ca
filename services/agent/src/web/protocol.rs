//! services/agent/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between an app window and the agent.

use habit_reminder_core::domain::{NotificationData, Toast};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

//=========================================================================================
// Messages Sent FROM an App Window TO the Agent
//=========================================================================================

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Must be the first message on the connection.
    Hello { url: String },

    /// The user pressed a button on (or clicked) an in-app toast.
    NotificationClicked {
        action: Option<String>,
        data: NotificationData,
    },
}

//=========================================================================================
// Messages Sent FROM the Agent TO an App Window
//=========================================================================================

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Registered { window_id: Uuid },

    /// The in-app substitute for a system notification.
    Toast { toast: Toast },

    /// Bring this window to the front.
    Focus,

    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use habit_reminder_core::domain::ToastSeverity;

    #[test]
    fn client_messages_are_tagged() {
        let hello: ClientMessage =
            serde_json::from_str(r#"{"type":"hello","url":"http://localhost:5173/habits"}"#)
                .unwrap();
        assert_eq!(
            hello,
            ClientMessage::Hello {
                url: "http://localhost:5173/habits".into()
            }
        );

        let click: ClientMessage = serde_json::from_str(
            r#"{"type":"notification_clicked","action":"snooze",
                "data":{"habitId":"h1","habitTitle":"Meditate","timestamp":1}}"#,
        )
        .unwrap();
        assert!(matches!(
            click,
            ClientMessage::NotificationClicked { action: Some(a), data } if a == "snooze" && data.habit_title == "Meditate"
        ));
    }

    #[test]
    fn toast_message_carries_its_payload() {
        let message = ServerMessage::Toast {
            toast: Toast {
                message: "Habit Reminder: Time for Read!".into(),
                severity: ToastSeverity::Info,
                data: None,
            },
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "toast");
        assert_eq!(json["toast"]["severity"], "info");
    }
}
