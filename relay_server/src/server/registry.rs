// Process-wide session table: code -> session and connection -> code.

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use relay_shared::SessionCode;
use tokio::sync::{Mutex, RwLock};

use super::connection::{ConnectionHandle, ConnectionId};
use super::session::Session;
use crate::error::RelayError;

/// Upper bound on random draws when minting a session code.
pub const MAX_CODE_ATTEMPTS: usize = 10_000;

pub type SharedSession = Arc<Mutex<Session>>;

/// Owner of every live session.
///
/// Lock order is session first, then the maps; the maps are never held while
/// waiting for a session lock.
pub struct Registry {
    sessions: RwLock<HashMap<SessionCode, SharedSession>>,
    by_connection: RwLock<HashMap<ConnectionId, SessionCode>>,
    code_length: usize,
}

impl Registry {
    pub fn new(code_length: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            by_connection: RwLock::new(HashMap::new()),
            code_length,
        }
    }

    pub fn code_length(&self) -> usize {
        self.code_length
    }

    /// Create a session under a fresh code with `host` already in slot 0.
    ///
    /// The host is seated before the session becomes visible, so a guessed
    /// code can never make someone else the host.
    pub async fn create_session(
        &self,
        capacity: usize,
        host_version: u8,
        host: &ConnectionHandle,
    ) -> Result<(SessionCode, SharedSession), RelayError> {
        let code;
        let shared;
        {
            let mut sessions = self.sessions.write().await;
            code = draw_code(&sessions, self.code_length)?;
            let mut session = Session::new(code.clone(), capacity, host_version);
            session.seat(host.clone());
            shared = Arc::new(Mutex::new(session));
            sessions.insert(code.clone(), shared.clone());
        }
        self.bind(host.id(), code.clone()).await;
        tracing::info!(%code, conn = %host.id(), capacity, host_version, "assigning session");
        Ok((code, shared))
    }

    pub async fn resolve(&self, code: &str) -> Option<SharedSession> {
        self.sessions.read().await.get(code).cloned()
    }

    pub async fn session_of(&self, id: ConnectionId) -> Option<SessionCode> {
        self.by_connection.read().await.get(&id).cloned()
    }

    /// Session the connection is seated in, if any.
    pub async fn session_for(&self, id: ConnectionId) -> Option<SharedSession> {
        let code = self.session_of(id).await?;
        self.resolve(code.as_str()).await
    }

    pub async fn bind(&self, id: ConnectionId, code: SessionCode) {
        self.by_connection.write().await.insert(id, code);
    }

    /// Forget the connection's binding. No-op if it has none.
    pub async fn unbind(&self, id: ConnectionId) -> Option<SessionCode> {
        self.by_connection.write().await.remove(&id)
    }

    /// Remove an emptied session. Callers must have vacated every seat.
    pub async fn destroy(&self, code: &SessionCode) -> bool {
        self.sessions.write().await.remove(code).is_some()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn binding_count(&self) -> usize {
        self.by_connection.read().await.len()
    }

    /// Forget every session and binding. Evicted sockets stay open but are no
    /// longer seated anywhere. Returns the number of sessions cleared.
    ///
    /// Bindings are released per session while its lock is held, so a join
    /// that was already inside the session when the reset began is unbound
    /// along with everyone else.
    pub async fn reset(&self) -> usize {
        let drained: Vec<SharedSession> = {
            let mut sessions = self.sessions.write().await;
            sessions.drain().map(|(_, s)| s).collect()
        };

        let mut evicted = 0;
        for shared in &drained {
            let mut session = shared.lock().await;
            for conn in session.evict_all() {
                self.unbind(conn.id()).await;
                evicted += 1;
            }
        }
        tracing::warn!(sessions = drained.len(), evicted, "registry reset");
        drained.len()
    }
}

fn draw_code(
    live: &HashMap<SessionCode, SharedSession>,
    len: usize,
) -> Result<SessionCode, RelayError> {
    let mut rng = rand::rng();
    for _ in 0..MAX_CODE_ATTEMPTS {
        let code: String = (0..len)
            .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
            .collect();
        if !live.contains_key(code.as_str()) {
            return Ok(SessionCode::from(code));
        }
    }
    Err(RelayError::CodeSpaceExhausted {
        attempts: MAX_CODE_ATTEMPTS,
    })
}
