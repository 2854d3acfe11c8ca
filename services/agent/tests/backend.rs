use agent_lib::adapters::HttpBackend;
use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use habit_reminder_core::domain::{Frequency, ReminderRecord, ReminderRegistration};
use habit_reminder_core::ports::{HabitBackend, PortError};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
struct Received {
    path: String,
    authorization: Option<String>,
    body: Value,
}

#[derive(Clone, Default)]
struct FakeServer {
    received: Arc<Mutex<Vec<Received>>>,
}

async fn record(
    State(server): State<FakeServer>,
    Path(path): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> StatusCode {
    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let failing = path == "completeHabit" && body["title"] == "Broken";
    server.received.lock().unwrap().push(Received {
        path,
        authorization,
        body,
    });
    if failing {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    }
}

/// Serves the fake backend on an ephemeral port and returns its base URL.
async fn serve() -> (String, FakeServer) {
    let server = FakeServer::default();
    let app = Router::new()
        .route("/api/auth/{path}", post(record))
        .with_state(server.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/api/auth/"), server)
}

#[tokio::test]
async fn complete_habit_posts_the_title_with_the_bearer() {
    let (base_url, server) = serve().await;
    let backend = HttpBackend::new(&base_url).unwrap();

    backend.complete_habit("bearer-1", "Meditate").await.unwrap();

    let received = server.received.lock().unwrap().clone();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].path, "completeHabit");
    assert_eq!(received[0].authorization.as_deref(), Some("Bearer bearer-1"));
    assert_eq!(received[0].body, json!({ "title": "Meditate" }));
}

#[tokio::test]
async fn register_reminder_sends_the_schedule() {
    let (base_url, server) = serve().await;
    let backend = HttpBackend::new(&base_url).unwrap();
    let record = ReminderRecord::new("h2", "Run", "09:00", Frequency::Weekly)
        .with_days(["Monday", "Wednesday"]);
    let mut registration = ReminderRegistration::from(&record);
    registration.user_id = Some("u1".into());

    backend
        .register_reminder("bearer-1", &registration)
        .await
        .unwrap();

    let received = server.received.lock().unwrap().clone();
    assert_eq!(received[0].path, "registerReminder");
    assert_eq!(received[0].body["frequency"], "weekly");
    assert_eq!(received[0].body["title"], "Run");
    assert_eq!(received[0].body["time"], "09:00");
    assert_eq!(received[0].body["days"], json!(["Monday", "Wednesday"]));
    assert_eq!(received[0].body["userId"], "u1");
}

#[tokio::test]
async fn device_token_may_be_saved_without_a_session() {
    let (base_url, server) = serve().await;
    let backend = HttpBackend::new(&base_url).unwrap();

    backend
        .save_notification_token(None, None, "device-1")
        .await
        .unwrap();

    let received = server.received.lock().unwrap().clone();
    assert_eq!(received[0].path, "saveNotificationToken");
    assert_eq!(received[0].authorization, None);
    assert_eq!(received[0].body["token"], "device-1");
}

#[tokio::test]
async fn failures_are_network_errors() {
    let (base_url, _server) = serve().await;
    let backend = HttpBackend::new(&base_url).unwrap();
    let result = backend.complete_habit("bearer-1", "Broken").await;
    assert!(matches!(result, Err(PortError::Network(_))));

    let unreachable = HttpBackend::new("http://127.0.0.1:9/api/auth").unwrap();
    let result = unreachable.complete_habit("bearer-1", "Meditate").await;
    assert!(matches!(result, Err(PortError::Network(_))));
}
