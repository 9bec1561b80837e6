use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

use crate::state::AppState;

/// Liveness probe with a room count for quick inspection.
pub async fn healthz(State(state): State<AppState>) -> Json<Value> {
    let rooms = state.registry.read().await.room_count();
    Json(json!({
        "status": "ok",
        "rooms": rooms,
    }))
}
