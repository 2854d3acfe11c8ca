//! services/agent/src/bin/agent.rs

use agent_lib::{
    adapters::{DesktopNotifier, HttpBackend, SqliteStore, SystemClock},
    config::Config,
    error::AgentError,
    web::{self, AppState, Ports, WindowHub},
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const INTERACTION_BUFFER: usize = 64;

#[tokio::main]
async fn main() -> Result<(), AgentError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting reminder agent...");

    // --- 2. Open the Reminder Store & Run Migrations ---
    info!("Opening reminder store...");
    let store = Arc::new(SqliteStore::open(&config.database_url).await?);
    info!("Reminder store ready.");

    // --- 3. Initialize Service Adapters ---
    let (interaction_tx, interaction_rx) = mpsc::channel(INTERACTION_BUFFER);
    let platform = Arc::new(DesktopNotifier::new(
        &config.notify_command,
        config.asset_dir.clone(),
        config.permission_prompt_timeout,
        store.clone(),
        interaction_tx,
    ));
    let backend = Arc::new(HttpBackend::new(&config.backend_url)?);
    let hub = Arc::new(WindowHub::new(&config.open_command));

    let ports = Ports {
        store: store.clone(),
        sessions: store.clone(),
        settings: store,
        platform,
        backend,
        clock: Arc::new(SystemClock),
    };

    // --- 4. Build the Shared AppState & Start the Background Runtime ---
    let shutdown = CancellationToken::new();
    let (app_state, wakes) = AppState::assemble(ports, hub, config.clone(), &shutdown);
    let app_state = Arc::new(app_state);
    app_state.spawn_dispatcher(interaction_rx);
    let runtime_task = tokio::spawn(app_state.runtime.clone().run(wakes, shutdown.clone()));

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown requested.");
            shutdown.cancel();
        });
    }

    // --- 5. Start the Server ---
    let app = web::router(app_state);
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
        .await?;

    if let Err(e) = runtime_task.await {
        return Err(AgentError::Internal(format!("background runtime panicked: {e}")));
    }
    info!("Reminder agent stopped.");
    Ok(())
}
