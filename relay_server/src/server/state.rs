use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::Config;
use crate::server::connection::{ConnectionHandle, ConnectionId, ConnectionTable, Outbound};
use crate::server::registry::Registry;

/// Shared application state exposed to handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    /// Every open socket, seated or not. Walked by the liveness monitor.
    pub connections: Arc<ConnectionTable>,
    /// Settings the server was started with. Not reloaded at runtime.
    pub config: Arc<Config>,
    /// Optional path to the TOML config file used by the running server.
    pub config_path: Option<PathBuf>,
    next_connection: Arc<AtomicU64>,
}

impl AppState {
    /// Create a new AppState with the given config and optional config path
    pub fn new(config: Config, config_path: Option<PathBuf>) -> Self {
        Self {
            registry: Arc::new(Registry::new(config.code_length)),
            connections: Arc::new(ConnectionTable::default()),
            config: Arc::new(config),
            config_path,
            next_connection: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Allocate a handle for a freshly accepted socket and start tracking it.
    pub async fn open_connection(&self) -> (ConnectionHandle, mpsc::Receiver<Outbound>) {
        let id = ConnectionId(self.next_connection.fetch_add(1, Ordering::Relaxed));
        let (conn, rx) = ConnectionHandle::channel(id, self.config.outbound_buffer);
        self.connections.insert(conn.clone()).await;
        (conn, rx)
    }
}

impl Default for AppState {
    fn default() -> Self {
        AppState::new(Config::default(), None)
    }
}
