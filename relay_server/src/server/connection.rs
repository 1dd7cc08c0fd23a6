// Per-connection handles shared between the socket task, sessions and the
// liveness monitor.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use relay_shared::ServerPacket;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch, RwLock};

/// Process-unique identifier of an accepted socket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Work item for a connection's writer task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outbound {
    Packet(Vec<u8>),
    Ping,
    Close,
}

/// Cheaply cloneable handle to one client socket.
///
/// Sends never block: frames go into a bounded queue drained by the writer
/// task, and a full or closed queue just drops the frame. A peer that stops
/// draining is evicted by the liveness monitor instead. Closing is signalled
/// outside the queue so it still lands when the queue is full.
#[derive(Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    tx: mpsc::Sender<Outbound>,
    alive: Arc<AtomicBool>,
    closing: Arc<watch::Sender<bool>>,
}

impl ConnectionHandle {
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Outbound>) -> Self {
        Self {
            id,
            tx,
            alive: Arc::new(AtomicBool::new(true)),
            closing: Arc::new(watch::channel(false).0),
        }
    }

    /// Build a handle together with the receiving end of its outbound queue.
    pub fn channel(id: ConnectionId, buffer: usize) -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self::new(id, tx), rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Whether the writer side is still accepting frames.
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Queue a raw frame. Returns false if it was dropped.
    pub fn send(&self, frame: Vec<u8>) -> bool {
        self.push(Outbound::Packet(frame))
    }

    pub fn send_packet(&self, packet: &ServerPacket) -> bool {
        self.send(packet.encode())
    }

    pub fn ping(&self) -> bool {
        self.push(Outbound::Ping)
    }

    /// Ask the writer to send a close frame and wake the reader loop.
    ///
    /// The queued close frame lets pending packets flush first; if the queue
    /// is full the shutdown signal alone still stops the writer.
    pub fn close(&self) {
        self.push(Outbound::Close);
        self.closing.send_replace(true);
    }

    pub fn is_closing(&self) -> bool {
        *self.closing.borrow()
    }

    /// Resolves once `close` has been called, including before this call.
    pub async fn closed(&self) {
        let mut rx = self.closing.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|closing| *closing).await;
    }

    /// Receiver side of the shutdown signal, for the writer task.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.closing.subscribe()
    }

    pub fn mark_alive(&self) {
        self.alive.store(true, Ordering::Release);
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Clear the liveness flag, returning whether it was set.
    pub fn take_alive(&self) -> bool {
        self.alive.swap(false, Ordering::AcqRel)
    }

    fn push(&self, item: Outbound) -> bool {
        match self.tx.try_send(item) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::debug!(conn = %self.id, "outbound queue full; dropping frame");
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(conn = %self.id, "outbound queue closed; dropping frame");
                false
            }
        }
    }
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ConnectionHandle {}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("alive", &self.is_alive())
            .field("open", &self.is_open())
            .finish()
    }
}

/// Every socket currently open, whether or not it is seated in a session.
#[derive(Default)]
pub struct ConnectionTable {
    inner: RwLock<HashMap<ConnectionId, ConnectionHandle>>,
}

impl ConnectionTable {
    pub async fn insert(&self, conn: ConnectionHandle) {
        self.inner.write().await.insert(conn.id(), conn);
    }

    pub async fn remove(&self, id: ConnectionId) -> Option<ConnectionHandle> {
        self.inner.write().await.remove(&id)
    }

    pub async fn snapshot(&self) -> Vec<ConnectionHandle> {
        self.inner.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}
