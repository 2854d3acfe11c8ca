//! services/agent/src/config.rs
//!
//! Defines the agent's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    /// Base URL of the habit backend's authenticated API.
    pub backend_url: String,
    /// Where the app lives; "open app" focuses or opens a window here.
    pub app_url: String,
    pub tick_interval: Duration,
    pub snooze: Duration,
    pub notify_command: String,
    pub open_command: String,
    pub asset_dir: PathBuf,
    pub permission_prompt_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 4000)),
            database_url: "sqlite://reminders.db".to_string(),
            log_level: Level::INFO,
            backend_url: "http://localhost:3000/api/auth".to_string(),
            app_url: "http://localhost:5173/".to_string(),
            tick_interval: Duration::from_secs(60),
            snooze: Duration::from_secs(15 * 60),
            notify_command: "notify-send".to_string(),
            open_command: "xdg-open".to_string(),
            asset_dir: PathBuf::from("./public"),
            permission_prompt_timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        let defaults = Self::default();

        // --- Server and Storage ---
        let bind_address = match std::env::var("BIND_ADDRESS") {
            Ok(value) => value.parse::<SocketAddr>().map_err(|e| {
                ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
            })?,
            Err(_) => defaults.bind_address,
        };

        let database_url = std::env::var("DATABASE_URL").unwrap_or(defaults.database_url);

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Backend and App ---
        let backend_url = std::env::var("BACKEND_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.backend_url);
        let app_url = std::env::var("APP_URL").unwrap_or(defaults.app_url);

        // --- Scheduling ---
        let tick_interval = seconds_var("TICK_INTERVAL_SECS", defaults.tick_interval)?;
        if tick_interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "TICK_INTERVAL_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        let snooze = match std::env::var("SNOOZE_MINUTES") {
            Ok(value) => {
                let minutes = value.parse::<u64>().map_err(|e| {
                    ConfigError::InvalidValue("SNOOZE_MINUTES".to_string(), e.to_string())
                })?;
                Duration::from_secs(minutes * 60)
            }
            Err(_) => defaults.snooze,
        };
        let permission_prompt_timeout =
            seconds_var("PERMISSION_PROMPT_SECS", defaults.permission_prompt_timeout)?;

        // --- Host Commands ---
        let notify_command = std::env::var("NOTIFY_COMMAND").unwrap_or(defaults.notify_command);
        let open_command = std::env::var("OPEN_COMMAND").unwrap_or(defaults.open_command);
        let asset_dir = std::env::var("ASSET_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.asset_dir);

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            backend_url,
            app_url,
            tick_interval,
            snooze,
            notify_command,
            open_command,
            asset_dir,
            permission_prompt_timeout,
        })
    }
}

fn seconds_var(name: &str, default: Duration) -> Result<Duration, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}
