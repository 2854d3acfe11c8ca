//! services/agent/src/adapters/backend.rs
//!
//! This module contains the adapter for the habit backend's REST API.
//! It implements the `HabitBackend` port with a single `reqwest` client.

use async_trait::async_trait;
use habit_reminder_core::domain::ReminderRegistration;
use habit_reminder_core::ports::{HabitBackend, PortError, PortResult};
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

#[derive(Serialize)]
struct CompleteHabitBody<'a> {
    title: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NotificationTokenBody<'a> {
    user_id: Option<&'a str>,
    token: &'a str,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `HabitBackend` port over HTTP.
#[derive(Clone)]
pub struct HttpBackend {
    base_url: String,
    http: Client,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Result<Self, reqwest::Error> {
        let http = Client::builder().build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// One attempt, no retry. Transport failures and non-2xx statuses are both
    /// reported as network failures.
    async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        bearer: Option<&str>,
        body: &T,
    ) -> PortResult<()> {
        let url = format!("{}/{}", self.base_url, path);
        let mut request = self.http.post(&url).json(body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PortError::Network(format!("POST {url} failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(PortError::Network(format!("POST {url} returned {status}")));
        }
        debug!("POST {} -> {}", url, status);
        Ok(())
    }
}

//=========================================================================================
// `HabitBackend` Trait Implementation
//=========================================================================================

#[async_trait]
impl HabitBackend for HttpBackend {
    async fn complete_habit(&self, token: &str, title: &str) -> PortResult<()> {
        self.post_json("completeHabit", Some(token), &CompleteHabitBody { title })
            .await
    }

    async fn register_reminder(
        &self,
        token: &str,
        registration: &ReminderRegistration,
    ) -> PortResult<()> {
        self.post_json("registerReminder", Some(token), registration)
            .await
    }

    async fn save_notification_token(
        &self,
        bearer: Option<&str>,
        user_id: Option<&str>,
        device_token: &str,
    ) -> PortResult<()> {
        let body = NotificationTokenBody {
            user_id,
            token: device_token,
        };
        self.post_json("saveNotificationToken", bearer, &body).await
    }
}
