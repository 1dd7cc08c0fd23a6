// Packet dispatch for one connection, independent of the socket type.
//
// The websocket task feeds every received frame through `handle_frame` and
// runs `teardown` once when the socket goes away. Both are also driven
// directly by tests with channel-backed connections.

use relay_shared::{ClientPacket, JoinStatus, ServerPacket, SessionCode};

use crate::error::RelayError;
use crate::server::connection::ConnectionHandle;
use crate::server::state::AppState;

/// What the socket loop should do after a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Close,
}

/// Decode and act on one inbound frame. Never fails: bad input is logged and
/// dropped, and a version mismatch is answered before asking for a close.
pub async fn handle_frame(state: &AppState, conn: &ConnectionHandle, frame: &[u8]) -> Flow {
    let result = match ClientPacket::decode(frame, state.registry.code_length()) {
        Ok(packet) => handle_packet(state, conn, packet, frame).await,
        Err(e) => Err(RelayError::from(e)),
    };

    match result {
        Ok(flow) => flow,
        Err(RelayError::VersionMismatch { expected, got }) => {
            tracing::info!(conn = %conn.id(), expected, got, "rejecting client with mismatched api version");
            conn.send_packet(&ServerPacket::ApiMismatch);
            Flow::Close
        }
        Err(e @ RelayError::CodeSpaceExhausted { .. }) => {
            tracing::error!(conn = %conn.id(), error = %e, "could not create session");
            Flow::Continue
        }
        Err(e) => {
            tracing::warn!(conn = %conn.id(), error = %e, "dropping packet");
            Flow::Continue
        }
    }
}

async fn handle_packet(
    state: &AppState,
    conn: &ConnectionHandle,
    packet: ClientPacket<'_>,
    frame: &[u8],
) -> Result<Flow, RelayError> {
    match packet {
        ClientPacket::DisconnectSelf => Ok(Flow::Close),
        ClientPacket::ChangeSession => {
            if state.registry.session_of(conn.id()).await.is_none() {
                return Err(RelayError::ProtocolViolation("change-session while not seated"));
            }
            leave_session(state, conn).await;
            Ok(Flow::Continue)
        }
        ClientPacket::CreateSession { api_version } => {
            create_session(state, conn, api_version).await?;
            Ok(Flow::Continue)
        }
        ClientPacket::JoinSession { code, hint } => {
            join_session(state, conn, code, hint).await?;
            Ok(Flow::Continue)
        }
        ClientPacket::StartGame { .. } => {
            relay(state, conn, frame, Route::StartThenBroadcast).await?;
            Ok(Flow::Continue)
        }
        ClientPacket::HostMessage { .. } => {
            relay(state, conn, frame, Route::Host).await?;
            Ok(Flow::Continue)
        }
        ClientPacket::Relay { .. } => {
            relay(state, conn, frame, Route::Broadcast).await?;
            Ok(Flow::Continue)
        }
        ClientPacket::Unexpected(_) => Err(RelayError::ProtocolViolation(
            "server-only tag received from client",
        )),
    }
}

async fn create_session(
    state: &AppState,
    conn: &ConnectionHandle,
    api_version: u8,
) -> Result<(), RelayError> {
    if state.registry.session_of(conn.id()).await.is_some() {
        return Err(RelayError::ProtocolViolation("create-session while already seated"));
    }
    let min = state.config.min_api_version;
    if api_version < min {
        return Err(RelayError::VersionMismatch {
            expected: min,
            got: api_version,
        });
    }
    let (code, _) = state
        .registry
        .create_session(state.config.default_capacity, api_version, conn)
        .await?;
    conn.send_packet(&ServerPacket::SessionAssigned { code });
    Ok(())
}

async fn join_session(
    state: &AppState,
    conn: &ConnectionHandle,
    code: SessionCode,
    hint: u8,
) -> Result<(), RelayError> {
    if state.registry.session_of(conn.id()).await.is_some() {
        return Err(RelayError::ProtocolViolation("join-session while already seated"));
    }
    tracing::debug!(%code, conn = %conn.id(), hint, "join request");

    let Some(shared) = state.registry.resolve(code.as_str()).await else {
        tracing::info!(%code, conn = %conn.id(), "join for unknown session");
        conn.send_packet(&ServerPacket::JoinResponse(JoinStatus::NotFound));
        return Ok(());
    };
    let mut session = shared.lock().await;

    let status = if session.is_closed() {
        JoinStatus::NotFound
    } else if session.is_started() {
        if session.is_full() {
            tracing::info!(%code, conn = %conn.id(), "session full");
            JoinStatus::Full
        } else if session
            .reconnect_player(conn, hint as usize, &state.registry)
            .await
        {
            // The rejoin acknowledgment was sent by the session.
            return Ok(());
        } else {
            tracing::info!(%code, conn = %conn.id(), slot = hint, "reconnect rejected");
            JoinStatus::ReconnectRejected
        }
    } else {
        if hint != session.host_version() {
            return Err(RelayError::VersionMismatch {
                expected: session.host_version(),
                got: hint,
            });
        }
        match session.add_player(conn, &state.registry).await {
            // Capacity and seat index both fit a byte.
            Some(slot) => JoinStatus::Success {
                occupants: session.occupied() as u8,
                slot: slot as u8,
            },
            None => JoinStatus::Full,
        }
    };
    conn.send_packet(&ServerPacket::JoinResponse(status));
    Ok(())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Route {
    Broadcast,
    Host,
    StartThenBroadcast,
}

async fn relay(
    state: &AppState,
    conn: &ConnectionHandle,
    frame: &[u8],
    route: Route,
) -> Result<(), RelayError> {
    let Some(shared) = state.registry.session_for(conn.id()).await else {
        return Err(RelayError::ProtocolViolation("relay from connection without a session"));
    };
    let mut session = shared.lock().await;
    if session.slot_of(conn.id()).is_none() {
        return Err(RelayError::ProtocolViolation("relay from connection not seated in its session"));
    }
    match route {
        Route::Host => {
            session.send_to_host(frame);
        }
        Route::StartThenBroadcast => {
            session.start();
            session.broadcast(Some(conn.id()), frame);
        }
        Route::Broadcast => {
            session.broadcast(Some(conn.id()), frame);
        }
    }
    Ok(())
}

/// Vacate the connection's seat, if it has one.
pub async fn leave_session(state: &AppState, conn: &ConnectionHandle) {
    match state.registry.session_for(conn.id()).await {
        Some(shared) => {
            shared.lock().await.drop_player(conn.id(), &state.registry).await;
        }
        None => {
            state.registry.unbind(conn.id()).await;
        }
    }
}

/// Release the connection's seat and table entry, then ask the socket to close.
///
/// Safe to call more than once; later calls find nothing left to release.
pub async fn teardown(state: &AppState, conn: &ConnectionHandle) {
    leave_session(state, conn).await;
    if state.connections.remove(conn.id()).await.is_some() {
        tracing::debug!(conn = %conn.id(), "connection released");
    }
    conn.close();
}
