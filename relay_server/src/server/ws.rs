// WebSocket handlers and websocket-specific helpers.

use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{Sink, SinkExt, StreamExt};
use owo_colors::OwoColorize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::server::connection::{ConnectionId, Outbound};
use crate::server::handler::{self, Flow};
use crate::server::state::AppState;

/// How long a finished connection may spend flushing queued frames.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (conn, rx) = state.open_connection().await;
    let hello = format!("{} {}", "[CONNECT]".bold().green(), conn.id().bold());
    tracing::info!(%hello);

    let (sink, mut stream) = socket.split();
    let writer = tokio::spawn(write_outbound(sink, rx, conn.shutdown_signal(), conn.id()));

    loop {
        tokio::select! {
            _ = conn.closed() => break,

            msg = stream.next() => {
                let flow = match msg {
                    Some(Ok(Message::Binary(bytes))) => handler::handle_frame(&state, &conn, &bytes).await,
                    Some(Ok(Message::Text(txt))) => handler::handle_frame(&state, &conn, txt.as_bytes()).await,
                    Some(Ok(Message::Pong(_))) => {
                        conn.mark_alive();
                        Flow::Continue
                    }
                    // Pings are answered by axum itself.
                    Some(Ok(Message::Ping(_))) => Flow::Continue,
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => Flow::Close,
                };
                if flow == Flow::Close {
                    break;
                }
            }
        }
    }

    handler::teardown(&state, &conn).await;
    let id = conn.id();
    drop(conn);
    finish_writer(writer, WRITER_DRAIN_TIMEOUT, id).await;
    let bye = format!("{} {}", "[DISCONNECT]".bold().red(), id.bold());
    tracing::info!(%bye);
}

/// Wait for the writer to flush. A writer stuck on a peer that stopped
/// reading is aborted, which drops its half of the socket. Returns whether
/// the writer finished on its own.
async fn finish_writer(mut writer: JoinHandle<()>, limit: Duration, id: ConnectionId) -> bool {
    if tokio::time::timeout(limit, &mut writer).await.is_err() {
        tracing::debug!(conn = %id, "writer did not drain in time; aborting");
        writer.abort();
        return false;
    }
    true
}

async fn shutdown_requested(signal: &mut watch::Receiver<bool>) {
    let _ = signal.wait_for(|closing| *closing).await;
}

/// Drain a connection's outbound queue into the socket until asked to close
/// or the socket fails.
///
/// Queued frames go out before the shutdown signal is honored, so a close
/// whose frame did not fit in the queue still ends with a close frame.
async fn write_outbound<S>(
    mut sink: S,
    mut rx: mpsc::Receiver<Outbound>,
    mut shutdown: watch::Receiver<bool>,
    id: ConnectionId,
) where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    loop {
        let item = tokio::select! {
            biased;
            item = rx.recv() => item,
            _ = shutdown_requested(&mut shutdown) => Some(Outbound::Close),
        };
        let Some(item) = item else { break };
        let result = match item {
            Outbound::Packet(frame) => sink.send(Message::Binary(frame)).await,
            Outbound::Ping => sink.send(Message::Ping(Vec::new())).await,
            Outbound::Close => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
        };
        if let Err(e) = result {
            tracing::debug!(conn = %id, error = %e, "websocket send failed");
            break;
        }
    }
    let _ = sink.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::connection::ConnectionHandle;
    use std::convert::Infallible;
    use std::sync::Arc;

    #[tokio::test]
    async fn close_frame_follows_queued_packets_when_queue_was_full() {
        let (conn, rx) = ConnectionHandle::channel(ConnectionId(1), 1);
        let (sink, out) = futures::channel::mpsc::unbounded::<Message>();
        assert!(conn.send(vec![7]));
        // No room left for the close item; only the signal gets through.
        conn.close();

        let writer = tokio::spawn(write_outbound(sink, rx, conn.shutdown_signal(), conn.id()));
        assert!(finish_writer(writer, WRITER_DRAIN_TIMEOUT, conn.id()).await);

        let sent: Vec<Message> = out.collect().await;
        assert_eq!(sent, vec![Message::Binary(vec![7]), Message::Close(None)]);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_writer_is_aborted_and_releases_the_socket() {
        let (conn, rx) = ConnectionHandle::channel(ConnectionId(2), 1);
        let socket = Arc::new(());
        // A peer that never reads: every send stays pending.
        let sink = Box::pin(futures::sink::unfold(
            socket.clone(),
            |held, _msg: Message| async move {
                let _held = held;
                std::future::pending::<Result<Arc<()>, Infallible>>().await
            },
        ));

        let writer = tokio::spawn(write_outbound(sink, rx, conn.shutdown_signal(), conn.id()));
        assert!(conn.send(vec![1]));
        conn.close();

        assert!(!finish_writer(writer, WRITER_DRAIN_TIMEOUT, conn.id()).await);
        for _ in 0..10 {
            if Arc::strong_count(&socket) == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(Arc::strong_count(&socket), 1);
    }
}
