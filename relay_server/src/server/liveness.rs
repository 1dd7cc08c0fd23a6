// Periodic heartbeat sweep that evicts half-open sockets.

use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::server::handler::teardown;
use crate::server::state::AppState;

/// Run sweeps forever at `period`. The first sweep happens one period after
/// start so fresh connections get a full interval to answer.
pub async fn run_liveness_monitor(state: AppState, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let evicted = sweep(&state).await;
        if evicted > 0 {
            tracing::info!(evicted, "liveness sweep evicted unresponsive connections");
        }
    }
}

/// One pass over every open connection.
///
/// A connection that has not answered the previous probe is torn down exactly
/// like an ordinary disconnect. Everyone else is marked pending and probed
/// again. Returns the number of evicted connections.
pub async fn sweep(state: &AppState) -> usize {
    let mut evicted = 0;
    for conn in state.connections.snapshot().await {
        if conn.take_alive() {
            conn.ping();
        } else {
            tracing::info!(conn = %conn.id(), "no heartbeat since last sweep; closing");
            teardown(state, &conn).await;
            evicted += 1;
        }
    }
    evicted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::connection::Outbound;
    use crate::server::handler::handle_frame;
    use relay_shared::{ClientPacket, ServerPacket, Tag};

    #[tokio::test]
    async fn responsive_connections_are_probed_not_evicted() {
        let state = AppState::default();
        let (conn, mut rx) = state.open_connection().await;

        assert_eq!(sweep(&state).await, 0);
        assert_eq!(rx.try_recv().ok(), Some(Outbound::Ping));
        assert!(!conn.is_alive());

        conn.mark_alive();
        assert_eq!(sweep(&state).await, 0);
        assert_eq!(state.connections.len().await, 1);
    }

    #[tokio::test]
    async fn silent_host_is_evicted_and_room_abandoned() {
        let state = AppState::default();
        let (host, mut host_rx) = state.open_connection().await;
        let (guest, mut guest_rx) = state.open_connection().await;

        handle_frame(&state, &host, &ClientPacket::CreateSession { api_version: 0 }.encode()).await;
        let code = match host_rx.try_recv() {
            Ok(Outbound::Packet(frame)) => match ServerPacket::decode(&frame) {
                Ok(ServerPacket::SessionAssigned { code }) => code,
                other => panic!("unexpected packet {other:?}"),
            },
            other => panic!("unexpected outbound {other:?}"),
        };
        handle_frame(&state, &guest, &ClientPacket::JoinSession { code: code.clone(), hint: 0 }.encode()).await;

        // First sweep probes both; only the guest answers.
        assert_eq!(sweep(&state).await, 0);
        guest.mark_alive();
        assert_eq!(sweep(&state).await, 1);

        assert!(state.registry.resolve(code.as_str()).await.is_none());
        assert!(state.registry.session_of(guest.id()).await.is_none());
        assert_eq!(state.connections.len().await, 1);

        let mut seen_close = false;
        while let Ok(item) = host_rx.try_recv() {
            seen_close |= item == Outbound::Close;
        }
        assert!(seen_close);

        let mut guest_saw_host_leave = false;
        while let Ok(item) = guest_rx.try_recv() {
            if let Outbound::Packet(frame) = item {
                guest_saw_host_leave |= frame == vec![Tag::PLAYER_DISCONNECT, 0];
            }
        }
        assert!(guest_saw_host_leave);
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_runs_on_its_interval() {
        let state = AppState::default();
        let (_conn, _rx) = state.open_connection().await;
        let task = tokio::spawn(run_liveness_monitor(state.clone(), Duration::from_secs(10)));

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(state.connections.len().await, 1);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(state.connections.len().await, 0);
        task.abort();
    }
}
