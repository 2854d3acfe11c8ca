//! services/agent/src/web/rest.rs
//!
//! Contains the Axum handlers for the local agent API and the master definition
//! for the OpenAPI specification.

use crate::runtime::{ControllerError, Delivery, ReminderInput, SaveOutcome};
use crate::web::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::NaiveDateTime;
use habit_reminder_core::domain::{
    Frequency, PushNotification, PushPayload, ReminderRecord, Session,
};
use habit_reminder_core::ports::PortError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::error;
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        list_reminders_handler,
        save_reminder_handler,
        set_enabled_handler,
        delete_reminder_handler,
        put_session_handler,
        delete_session_handler,
        push_handler,
        sync_handler,
    ),
    components(
        schemas(
            ReminderDto,
            SaveReminderRequest,
            SaveReminderResponse,
            SetEnabledRequest,
            SessionRequest,
            PushRequest,
            PushNotificationDto,
            PushResponse,
            SyncRequest,
            SyncResponse,
        )
    ),
    tags(
        (name = "Habit Reminder Agent", description = "Local API for scheduling habit reminders.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReminderDto {
    pub id: String,
    pub title: String,
    /// `HH:MM`, 24-hour local time.
    pub time: String,
    pub days: Vec<String>,
    /// One of `daily`, `weekly`, `custom`.
    pub frequency: String,
    pub enabled: bool,
    pub snoozed_until: Option<NaiveDateTime>,
}

impl From<ReminderRecord> for ReminderDto {
    fn from(record: ReminderRecord) -> Self {
        Self {
            id: record.id,
            title: record.title,
            time: record.time,
            days: record.days,
            frequency: record.frequency.as_str().to_string(),
            enabled: record.enabled,
            snoozed_until: record.snoozed_until,
        }
    }
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveReminderRequest {
    pub title: String,
    /// Defaults to `08:00`.
    pub time: Option<String>,
    #[serde(default)]
    pub days: Vec<String>,
    pub frequency: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

/// The locally computed schedule, returned for immediate feedback.
#[derive(Serialize, Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SaveReminderResponse {
    pub reminder: ReminderDto,
    pub next_fire_at: Option<NaiveDateTime>,
    pub delay_ms: Option<u64>,
    /// `granted`, `denied` or `unsupported`; absent when the reminder is off.
    pub permission: Option<String>,
}

impl From<SaveOutcome> for SaveReminderResponse {
    fn from(outcome: SaveOutcome) -> Self {
        Self {
            reminder: outcome.record.into(),
            next_fire_at: outcome.next_fire_at,
            delay_ms: outcome
                .delay
                .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            permission: outcome.permission.map(|p| p.as_str().to_string()),
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct SetEnabledRequest {
    pub enabled: bool,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub token: String,
    pub user_id: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct PushNotificationDto {
    pub title: String,
    pub body: String,
}

#[derive(Deserialize, ToSchema)]
pub struct PushRequest {
    pub notification: PushNotificationDto,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct PushResponse {
    /// `system` or `in_app`.
    pub delivery: String,
}

#[derive(Deserialize, ToSchema)]
pub struct SyncRequest {
    pub tag: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct SyncResponse {
    /// False when the tag is not the reminder sync tag.
    pub evaluated: bool,
    pub fired: usize,
}

//=========================================================================================
// Error Mapping
//=========================================================================================

fn port_error(context: &str, e: PortError) -> (StatusCode, String) {
    match e {
        PortError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{what} not found")),
        other => {
            error!("{}: {:?}", context, other);
            (StatusCode::INTERNAL_SERVER_ERROR, context.to_string())
        }
    }
}

fn controller_error(context: &str, e: ControllerError) -> (StatusCode, String) {
    match e {
        ControllerError::Schedule(e) => (StatusCode::BAD_REQUEST, e.to_string()),
        ControllerError::EmptyTitle => (StatusCode::BAD_REQUEST, e.to_string()),
        ControllerError::Port(e) => port_error(context, e),
    }
}

fn delivery_name(delivery: Delivery) -> &'static str {
    match delivery {
        Delivery::System => "system",
        Delivery::InApp => "in_app",
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// List every stored reminder, enabled or not.
#[utoipa::path(
    get,
    path = "/reminders",
    responses(
        (status = 200, description = "Snapshot of the reminder table", body = [ReminderDto]),
        (status = 500, description = "Reminder store unavailable")
    )
)]
pub async fn list_reminders_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<ReminderDto>>, (StatusCode, String)> {
    let records = app_state
        .controller
        .list()
        .await
        .map_err(|e| port_error("Failed to list reminders", e))?;
    Ok(Json(records.into_iter().map(ReminderDto::from).collect()))
}

/// Create or replace the reminder of a habit.
///
/// Permission is requested here, when the user opts in, the first time only.
#[utoipa::path(
    put,
    path = "/reminders/{id}",
    request_body = SaveReminderRequest,
    params(("id" = String, Path, description = "The owning habit's identifier.")),
    responses(
        (status = 200, description = "Reminder saved and armed", body = SaveReminderResponse),
        (status = 400, description = "Malformed time, unknown day or frequency, or empty title"),
        (status = 500, description = "Reminder store unavailable")
    )
)]
pub async fn save_reminder_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<SaveReminderRequest>,
) -> Result<Json<SaveReminderResponse>, (StatusCode, String)> {
    let frequency = Frequency::from_str(&payload.frequency)
        .map_err(|e| (StatusCode::BAD_REQUEST, e))?;
    let input = ReminderInput {
        title: payload.title,
        time: payload.time,
        days: payload.days,
        frequency,
        enabled: payload.enabled,
    };
    let outcome = app_state
        .controller
        .save_habit_reminder(&id, input)
        .await
        .map_err(|e| controller_error("Failed to save reminder", e))?;
    Ok(Json(outcome.into()))
}

/// Turn a reminder on or off without re-entering its schedule.
#[utoipa::path(
    post,
    path = "/reminders/{id}/enabled",
    request_body = SetEnabledRequest,
    params(("id" = String, Path, description = "The owning habit's identifier.")),
    responses(
        (status = 200, description = "Reminder updated", body = SaveReminderResponse),
        (status = 404, description = "No reminder for this habit"),
        (status = 500, description = "Reminder store unavailable")
    )
)]
pub async fn set_enabled_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<SetEnabledRequest>,
) -> Result<Json<SaveReminderResponse>, (StatusCode, String)> {
    let outcome = app_state
        .controller
        .set_enabled(&id, payload.enabled)
        .await
        .map_err(|e| controller_error("Failed to update reminder", e))?;
    Ok(Json(outcome.into()))
}

/// Remove the reminder of a deleted habit. Removing an absent reminder succeeds.
#[utoipa::path(
    delete,
    path = "/reminders/{id}",
    params(("id" = String, Path, description = "The owning habit's identifier.")),
    responses(
        (status = 204, description = "Reminder removed"),
        (status = 500, description = "Reminder store unavailable")
    )
)]
pub async fn delete_reminder_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    app_state
        .controller
        .remove(&id)
        .await
        .map_err(|e| port_error("Failed to remove reminder", e))?;
    Ok(StatusCode::NO_CONTENT)
}

/// Store the signed-in session's bearer token for background use.
#[utoipa::path(
    put,
    path = "/session",
    request_body = SessionRequest,
    responses(
        (status = 204, description = "Session stored"),
        (status = 400, description = "Empty token"),
        (status = 500, description = "Session store unavailable")
    )
)]
pub async fn put_session_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<SessionRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    if payload.token.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "token must not be empty".to_string()));
    }
    app_state
        .controller
        .start_session(Session {
            token: payload.token,
            user_id: payload.user_id,
        })
        .await
        .map_err(|e| port_error("Failed to store session", e))?;
    Ok(StatusCode::NO_CONTENT)
}

/// Forget the session on logout.
#[utoipa::path(
    delete,
    path = "/session",
    responses(
        (status = 204, description = "Session cleared"),
        (status = 500, description = "Session store unavailable")
    )
)]
pub async fn delete_session_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<StatusCode, (StatusCode, String)> {
    app_state
        .controller
        .end_session()
        .await
        .map_err(|e| port_error("Failed to clear session", e))?;
    Ok(StatusCode::NO_CONTENT)
}

/// Deliver an inbound push message. The push is itself the due signal.
#[utoipa::path(
    post,
    path = "/push",
    request_body = PushRequest,
    responses(
        (status = 202, description = "Notification shown", body = PushResponse),
        (status = 500, description = "Neither a system notification nor a toast could be shown")
    )
)]
pub async fn push_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<PushRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let payload = PushPayload {
        notification: PushNotification {
            title: payload.notification.title,
            body: payload.notification.body,
        },
    };
    let delivery = app_state
        .runtime
        .notifier()
        .show_push(&payload)
        .await
        .map_err(|e| port_error("Failed to show push notification", e))?;
    let response = PushResponse {
        delivery: delivery_name(delivery).to_string(),
    };
    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// Periodic-sync wake-up from the host.
#[utoipa::path(
    post,
    path = "/sync",
    request_body = SyncRequest,
    responses(
        (status = 200, description = "Sync handled", body = SyncResponse),
        (status = 500, description = "Reminder store unavailable")
    )
)]
pub async fn sync_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<SyncRequest>,
) -> Result<Json<SyncResponse>, (StatusCode, String)> {
    let report = app_state
        .runtime
        .sync(&payload.tag)
        .await
        .map_err(|e| port_error("Reminder pass failed", e))?;
    Ok(Json(SyncResponse {
        evaluated: report.is_some(),
        fired: report.map_or(0, |r| r.fired.len()),
    }))
}
