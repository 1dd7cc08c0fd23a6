// HTTP handlers for health checks and administrative reset.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct Health {
    pub ok: bool,
    pub sessions: usize,
    pub connections: usize,
}

pub async fn health_handler(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        ok: true,
        sessions: state.registry.session_count().await,
        connections: state.connections.len().await,
    })
}

/// Drop every session unconditionally. Sockets stay open but unseated.
pub async fn reset_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let cleared = state.registry.reset().await;
    Json(serde_json::json!({ "ok": true, "cleared": cleared }))
}
