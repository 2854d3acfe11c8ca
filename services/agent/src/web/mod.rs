pub mod hub;
pub mod protocol;
pub mod rest;
pub mod state;
pub mod ws_handler;

use axum::http::{header::CONTENT_TYPE, HeaderValue, Method};
use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::warn;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use hub::WindowHub;
pub use rest::ApiDoc;
pub use state::{AppState, Ports};
pub use ws_handler::ws_handler;

/// Builds the complete router: the local API, the window channel and Swagger UI.
pub fn router(app_state: Arc<AppState>) -> Router {
    let origin = hub::url_origin(&app_state.config.app_url);
    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]);
    match origin.parse::<HeaderValue>() {
        Ok(origin) => cors = cors.allow_origin(origin),
        Err(e) => warn!("APP_URL origin '{}' is not a valid header value: {}", origin, e),
    }

    let api_router = Router::new()
        .route("/reminders", get(rest::list_reminders_handler))
        .route(
            "/reminders/{id}",
            put(rest::save_reminder_handler).delete(rest::delete_reminder_handler),
        )
        .route("/reminders/{id}/enabled", post(rest::set_enabled_handler))
        .route(
            "/session",
            put(rest::put_session_handler).delete(rest::delete_session_handler),
        )
        .route("/push", post(rest::push_handler))
        .route("/sync", post(rest::sync_handler))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .with_state(app_state);

    Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
