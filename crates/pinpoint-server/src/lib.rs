pub mod config;
pub mod error;
pub mod health;
pub mod image_store;
pub mod room_manager;
pub mod session;
pub mod state;
pub mod ws;

use axum::Router;
use tower_http::cors::CorsLayer;

use config::ServerConfig;
use state::AppState;

/// Build the Axum router and application state from a config.
pub fn build_app(config: ServerConfig) -> (Router<()>, AppState) {
    let state = AppState::new(config);

    let app = Router::new()
        .route("/ws", axum::routing::get(ws::ws_handler))
        .route("/health", axum::routing::get(health::health_check))
        .route("/ready", axum::routing::get(health::readiness_check))
        .route("/images/{id}", axum::routing::get(image_store::get_image))
        .layer(CorsLayer::permissive())
        .with_state(state.clone());

    (app, state)
}
