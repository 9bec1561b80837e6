pub mod config;
pub mod health;
pub mod registry;
pub mod state;
pub mod ws;

use std::time::Duration;

use axum::Router;
use tower_http::services::ServeDir;

use config::ServerConfig;
use state::AppState;

/// Build the Axum router and application state from a config.
pub fn build_app(config: ServerConfig) -> (Router<()>, AppState) {
    let web_root = config.web_root.clone();
    let state = AppState::new(config);

    let app = Router::new()
        .route("/ws", axum::routing::get(ws::ws_handler))
        .route("/healthz", axum::routing::get(health::healthz))
        .fallback_service(ServeDir::new(&web_root))
        .with_state(state.clone());

    (app, state)
}

/// Background task that periodically removes idle rooms.
pub fn spawn_idle_sweeper(state: AppState) {
    tokio::spawn(async move {
        let interval = Duration::from_secs(state.config.rooms.idle_check_interval_secs);
        let max_idle = Duration::from_secs(state.config.rooms.idle_timeout_secs);
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // the first tick completes immediately
        loop {
            ticker.tick().await;
            let removed = registry::sweep_idle_rooms(&state.registry, max_idle).await;
            if removed > 0 {
                tracing::info!(removed, "Removed idle rooms");
                registry::broadcast_lobby_list(&state.registry).await;
            }
        }
    });
}
