// Run and routing helpers (build_router, run_server).

use std::net::SocketAddr;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::services::ServeDir;

use crate::server::AppState;
use anyhow::{Context, Result};

pub fn build_router(state: AppState) -> Router {
    let serve_dir =
        ServeDir::new(state.config.static_dir.as_str()).append_index_html_on_directories(true);

    Router::new()
        .route("/health", get(crate::server::http::health_handler))
        .route("/admin/reset", post(crate::server::http::reset_handler))
        .route("/ws", get(crate::server::ws::ws_handler))
        // Everything else is a static client asset.
        .fallback_service(serve_dir)
        .with_state(state)
}

pub async fn run_server(addr: SocketAddr, state: AppState) -> Result<()> {
    let app = build_router(state.clone());

    {
        let state_clone = state.clone();
        let period = state.config.heartbeat_interval();
        tokio::spawn(async move {
            crate::server::liveness::run_liveness_monitor(state_clone, period).await;
        });
    }

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    tracing::info!(%addr, static_dir = %state.config.static_dir, "relay server listening");

    axum::serve(listener, app)
        .await
        .with_context(|| "serving relay")?;
    Ok(())
}
