// One relay room: its seat table, phase and fan-out.

use std::collections::VecDeque;

use relay_shared::{JoinStatus, ServerPacket, SessionCode};

use super::connection::{ConnectionHandle, ConnectionId};
use super::registry::Registry;

/// Seat index of the session creator.
pub const HOST_SLOT: usize = 0;

/// One seat in a session.
///
/// An empty seat is either reusable by a new joiner (lobby) or reserved for
/// its former occupant to reconnect into (started).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Slot {
    Occupied(ConnectionHandle),
    Empty,
}

impl Slot {
    pub fn connection(&self) -> Option<&ConnectionHandle> {
        match self {
            Slot::Occupied(conn) => Some(conn),
            Slot::Empty => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Slot::Empty)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Accepting new participants.
    Lobby,
    /// Seat table frozen; only reconnection into vacated seats.
    Started,
}

/// State of a single session.
///
/// The phase is derived rather than stored: a session has started exactly when
/// its seat table has grown to `capacity`. `start` freezes the capacity to the
/// current table length, and a lobby that fills up starts on its own.
#[derive(Debug)]
pub struct Session {
    code: SessionCode,
    capacity: usize,
    host_version: u8,
    slots: Vec<Slot>,
    occupied: usize,
    closed: bool,
}

impl Session {
    pub fn new(code: SessionCode, capacity: usize, host_version: u8) -> Self {
        Self {
            code,
            capacity,
            host_version,
            slots: Vec::with_capacity(capacity),
            occupied: 0,
            closed: false,
        }
    }

    pub fn code(&self) -> &SessionCode {
        &self.code
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn host_version(&self) -> u8 {
        self.host_version
    }

    pub fn occupied(&self) -> usize {
        self.occupied
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn phase(&self) -> Phase {
        if self.slots.len() >= self.capacity {
            Phase::Started
        } else {
            Phase::Lobby
        }
    }

    pub fn is_started(&self) -> bool {
        self.phase() == Phase::Started
    }

    /// Every seat that exists is taken.
    pub fn is_full(&self) -> bool {
        self.occupied == self.capacity
    }

    /// Set once the last occupant left and the registry forgot this session.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn slot_of(&self, id: ConnectionId) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.connection().is_some_and(|c| c.id() == id))
    }

    pub fn host(&self) -> Option<&ConnectionHandle> {
        self.slots.get(HOST_SLOT).and_then(Slot::connection)
    }

    /// Place `conn` in the lowest empty seat, or a new one, without notifying
    /// anyone or touching the registry.
    pub(crate) fn seat(&mut self, conn: ConnectionHandle) -> Option<usize> {
        if self.closed || self.is_started() {
            return None;
        }
        let slot = match self.slots.iter().position(Slot::is_empty) {
            Some(hole) => {
                self.slots[hole] = Slot::Occupied(conn);
                hole
            }
            None => {
                self.slots.push(Slot::Occupied(conn));
                self.slots.len() - 1
            }
        };
        self.occupied += 1;
        Some(slot)
    }

    /// Admit a new participant. Rejected once the session has started.
    pub async fn add_player(&mut self, conn: &ConnectionHandle, registry: &Registry) -> Option<usize> {
        let slot = self.seat(conn.clone())?;
        self.broadcast(Some(conn.id()), &joined(slot));
        registry.bind(conn.id(), self.code.clone()).await;
        tracing::info!(code = %self.code, conn = %conn.id(), slot, occupied = self.occupied, "player joined");
        Some(slot)
    }

    /// Vacate the seat held by `id`, returning its index.
    ///
    /// Losing the host vacates every other seat too. The session is removed
    /// from the registry as soon as no seat is occupied. Unknown connections
    /// are only unbound.
    pub async fn drop_player(&mut self, id: ConnectionId, registry: &Registry) -> Option<usize> {
        let Some(first) = self.slot_of(id) else {
            registry.unbind(id).await;
            return None;
        };

        let mut pending = VecDeque::from([first]);
        while let Some(slot) = pending.pop_front() {
            let Slot::Occupied(conn) = std::mem::replace(&mut self.slots[slot], Slot::Empty) else {
                continue;
            };
            self.occupied -= 1;
            registry.unbind(conn.id()).await;
            tracing::info!(code = %self.code, conn = %conn.id(), slot, occupied = self.occupied, "dropping player");

            if self.occupied == 0 {
                self.closed = true;
                registry.destroy(&self.code).await;
                tracing::info!(code = %self.code, "freeing session");
            } else {
                self.broadcast(None, &ServerPacket::PlayerDisconnected { slot: wire_slot(slot) }.encode());
            }

            if slot == HOST_SLOT && self.occupied > 0 {
                tracing::info!(code = %self.code, "lost host; abandoning session");
                pending.extend(
                    self.slots
                        .iter()
                        .enumerate()
                        .filter(|(_, s)| !s.is_empty())
                        .map(|(i, _)| i),
                );
            }
        }
        Some(first)
    }

    /// Put a returning participant back into the seat it held before.
    ///
    /// Only valid after start, into an existing empty seat, while not every
    /// seat is taken. The returning client gets a rejoin acknowledgment.
    pub async fn reconnect_player(
        &mut self,
        conn: &ConnectionHandle,
        slot: usize,
        registry: &Registry,
    ) -> bool {
        if self.closed || !self.is_started() || self.is_full() {
            return false;
        }
        match self.slots.get(slot) {
            Some(Slot::Empty) => {}
            _ => return false,
        }
        self.slots[slot] = Slot::Occupied(conn.clone());
        self.occupied += 1;
        registry.bind(conn.id(), self.code.clone()).await;
        self.broadcast(Some(conn.id()), &joined(slot));
        conn.send_packet(&ServerPacket::JoinResponse(JoinStatus::Rejoined));
        tracing::info!(code = %self.code, conn = %conn.id(), slot, occupied = self.occupied, "player reconnected");
        true
    }

    /// Send `frame` to every open occupant except `exclude`. Returns how many
    /// queues accepted it.
    pub fn broadcast(&self, exclude: Option<ConnectionId>, frame: &[u8]) -> usize {
        self.slots
            .iter()
            .filter_map(Slot::connection)
            .filter(|c| Some(c.id()) != exclude && c.is_open())
            .filter(|c| c.send(frame.to_vec()))
            .count()
    }

    /// Deliver a host-directed frame to slot 0 only.
    pub fn send_to_host(&self, frame: &[u8]) -> bool {
        match self.host() {
            Some(host) if host.is_open() => host.send(frame.to_vec()),
            _ => false,
        }
    }

    /// Freeze the seat table. No-op once started.
    pub fn start(&mut self) {
        if self.is_started() {
            return;
        }
        self.capacity = self.slots.len();
        tracing::info!(code = %self.code, capacity = self.capacity, "session started");
    }

    /// Empty every seat and mark the session closed, returning the evicted
    /// connections. Used by the administrative reset.
    pub(crate) fn evict_all(&mut self) -> Vec<ConnectionHandle> {
        self.closed = true;
        self.occupied = 0;
        self.slots
            .iter_mut()
            .filter_map(|s| match std::mem::replace(s, Slot::Empty) {
                Slot::Occupied(conn) => Some(conn),
                Slot::Empty => None,
            })
            .collect()
    }
}

// Capacity is validated to fit a byte, so seat indices do too.
fn wire_slot(slot: usize) -> u8 {
    slot as u8
}

fn joined(slot: usize) -> Vec<u8> {
    ServerPacket::PlayerJoined { slot: wire_slot(slot) }.encode()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::connection::Outbound;
    use tokio::sync::mpsc;

    struct Client {
        conn: ConnectionHandle,
        rx: mpsc::Receiver<Outbound>,
    }

    impl Client {
        fn new(id: u64) -> Self {
            let (conn, rx) = ConnectionHandle::channel(ConnectionId(id), 64);
            Self { conn, rx }
        }

        fn split(self) -> (ConnectionHandle, mpsc::Receiver<Outbound>) {
            (self.conn, self.rx)
        }

        fn drain(&mut self) -> Vec<ServerPacket> {
            let mut out = Vec::new();
            while let Ok(item) = self.rx.try_recv() {
                if let Outbound::Packet(frame) = item {
                    out.push(ServerPacket::decode(&frame).expect("server frames decode"));
                }
            }
            out
        }
    }

    fn assert_invariants(s: &Session) {
        let occupied = s.slots().iter().filter(|x| !x.is_empty()).count();
        assert_eq!(s.occupied(), occupied);
        assert_eq!(s.is_started(), s.slots().len() >= s.capacity());
    }

    async fn lobby(registry: &Registry, clients: &[&Client]) -> Session {
        let mut s = Session::new(SessionCode::from("00001"), 6, 2);
        for c in clients {
            s.add_player(&c.conn, registry).await.expect("lobby admits");
        }
        s
    }

    #[tokio::test]
    async fn lobby_join_reuses_lowest_hole() {
        let registry = Registry::new(5);
        let (a, b, c, d) = (Client::new(1), Client::new(2), Client::new(3), Client::new(4));
        let mut s = lobby(&registry, &[&a, &b, &c]).await;

        assert_eq!(s.drop_player(b.conn.id(), &registry).await, Some(1));
        assert_eq!(s.slots().len(), 3);
        assert_eq!(s.add_player(&d.conn, &registry).await, Some(1));
        assert_eq!(s.slot_of(d.conn.id()), Some(1));
        assert_eq!(s.occupied(), 3);
        assert_invariants(&s);
    }

    #[tokio::test]
    async fn join_notifies_everyone_else() {
        let registry = Registry::new(5);
        let (mut a, mut b) = (Client::new(1), Client::new(2));
        let _s = lobby(&registry, &[&a, &b]).await;

        assert_eq!(a.drain(), vec![ServerPacket::PlayerJoined { slot: 1 }]);
        assert!(b.drain().is_empty());
        assert!(registry.session_of(b.conn.id()).await.is_some());
    }

    #[tokio::test]
    async fn filling_the_lobby_starts_the_session() {
        let registry = Registry::new(5);
        let mut s = Session::new(SessionCode::from("00002"), 2, 0);
        let (a, b, c) = (Client::new(1), Client::new(2), Client::new(3));
        assert_eq!(s.add_player(&a.conn, &registry).await, Some(0));
        assert_eq!(s.add_player(&b.conn, &registry).await, Some(1));
        assert_eq!(s.phase(), Phase::Started);
        assert_eq!(s.add_player(&c.conn, &registry).await, None);
        assert!(registry.session_of(c.conn.id()).await.is_none());
    }

    #[tokio::test]
    async fn start_freezes_capacity_once() {
        let registry = Registry::new(5);
        let (a, b, c) = (Client::new(1), Client::new(2), Client::new(3));
        let mut s = lobby(&registry, &[&a, &b]).await;
        s.start();
        assert_eq!(s.capacity(), 2);
        assert!(s.is_started());

        s.drop_player(b.conn.id(), &registry).await;
        s.start();
        assert_eq!(s.capacity(), 2);
        assert_eq!(s.add_player(&c.conn, &registry).await, None);
        assert_invariants(&s);
    }

    #[tokio::test]
    async fn host_loss_drops_everyone_and_destroys_session() -> anyhow::Result<()> {
        let registry = Registry::new(5);
        let (host, _) = Client::new(1).split();
        let (mut b, mut c) = (Client::new(2), Client::new(3));
        let (code, shared) = registry.create_session(6, 2, &host).await?;
        {
            let mut s = shared.lock().await;
            s.add_player(&b.conn, &registry).await;
            s.add_player(&c.conn, &registry).await;
            b.drain();
            c.drain();

            assert_eq!(s.drop_player(host.id(), &registry).await, Some(0));
            assert_eq!(s.occupied(), 0);
            assert!(s.is_closed());
            assert!(s.slots().iter().all(Slot::is_empty));
        }
        assert!(registry.resolve(code.as_str()).await.is_none());
        for id in [host.id(), b.conn.id(), c.conn.id()] {
            assert!(registry.session_of(id).await.is_none());
        }
        // Seats are vacated in order, so b only sees the host leave while c
        // also sees b go before the room is freed.
        assert_eq!(b.drain(), vec![ServerPacket::PlayerDisconnected { slot: 0 }]);
        assert_eq!(
            c.drain(),
            vec![
                ServerPacket::PlayerDisconnected { slot: 0 },
                ServerPacket::PlayerDisconnected { slot: 1 },
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn host_loss_cascades_after_start_too() {
        let registry = Registry::new(5);
        let (a, b, c) = (Client::new(1), Client::new(2), Client::new(3));
        let mut s = lobby(&registry, &[&a, &b, &c]).await;
        s.start();
        s.drop_player(b.conn.id(), &registry).await;
        s.drop_player(a.conn.id(), &registry).await;
        assert_eq!(s.occupied(), 0);
        assert!(s.is_closed());
    }

    #[tokio::test]
    async fn dropping_a_stranger_is_harmless() {
        let registry = Registry::new(5);
        let (a, stranger) = (Client::new(1), Client::new(9));
        let mut s = lobby(&registry, &[&a]).await;
        assert_eq!(s.drop_player(stranger.conn.id(), &registry).await, None);
        assert_eq!(s.occupied(), 1);
        assert_invariants(&s);
    }

    #[tokio::test]
    async fn reconnect_restores_seat_with_rejoin_ack() {
        let registry = Registry::new(5);
        let (mut a, b, mut c, mut b2) = (Client::new(1), Client::new(2), Client::new(3), Client::new(4));
        let mut s = lobby(&registry, &[&a, &b, &c]).await;
        s.start();
        s.drop_player(b.conn.id(), &registry).await;
        a.drain();
        c.drain();

        assert!(s.reconnect_player(&b2.conn, 1, &registry).await);
        assert_eq!(s.capacity(), 3);
        assert_eq!(s.occupied(), 3);
        assert_eq!(s.slot_of(b2.conn.id()), Some(1));
        assert_eq!(b2.drain(), vec![ServerPacket::JoinResponse(JoinStatus::Rejoined)]);
        assert_eq!(a.drain(), vec![ServerPacket::PlayerJoined { slot: 1 }]);
        assert_eq!(c.drain(), vec![ServerPacket::PlayerJoined { slot: 1 }]);
        assert!(registry.session_of(b2.conn.id()).await.is_some());
        assert_invariants(&s);
    }

    #[tokio::test]
    async fn reconnect_into_taken_or_missing_seat_is_rejected() {
        let registry = Registry::new(5);
        let (a, b, c, d) = (Client::new(1), Client::new(2), Client::new(3), Client::new(4));
        let mut s = lobby(&registry, &[&a, &b, &c]).await;

        // Not started yet.
        assert!(!s.reconnect_player(&d.conn, 1, &registry).await);

        s.start();
        s.drop_player(c.conn.id(), &registry).await;
        assert!(!s.reconnect_player(&d.conn, 1, &registry).await);
        assert!(!s.reconnect_player(&d.conn, 7, &registry).await);
        assert_eq!(s.occupied(), 2);
        assert!(registry.session_of(d.conn.id()).await.is_none());
        assert_invariants(&s);
    }

    #[tokio::test]
    async fn broadcast_skips_sender_and_closed_peers() {
        let registry = Registry::new(5);
        let (mut a, mut b, c) = (Client::new(1), Client::new(2), Client::new(3));
        let s = lobby(&registry, &[&a, &b, &c]).await;
        a.drain();
        b.drain();
        let Client { rx: c_rx, .. } = c;
        drop(c_rx);

        assert_eq!(s.broadcast(Some(b.conn.id()), &[0, 42]), 1);
        assert_eq!(
            a.drain(),
            vec![ServerPacket::Relayed { tag: 0, payload: vec![42] }]
        );
        assert!(b.drain().is_empty());
    }

    #[tokio::test]
    async fn host_directed_frames_reach_only_slot_zero() {
        let registry = Registry::new(5);
        let (mut a, mut b, mut c) = (Client::new(1), Client::new(2), Client::new(3));
        let s = lobby(&registry, &[&a, &b, &c]).await;
        a.drain();
        b.drain();

        assert!(s.send_to_host(&[1, 5]));
        assert_eq!(a.drain(), vec![ServerPacket::Relayed { tag: 1, payload: vec![5] }]);
        assert!(b.drain().is_empty());
        assert!(c.drain().is_empty());
    }
}
