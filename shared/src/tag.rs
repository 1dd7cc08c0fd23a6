//! Leading tag byte of every packet on the relay socket.

use serde::{Deserialize, Serialize};

/// Classification of the first byte of a packet.
///
/// Several bytes are shared between a client request and the matching server
/// response (`AssignedSession`, `JoinSession`, `PlayerDisconnect`); direction
/// decides which payload shape applies. Bytes the relay does not know are kept
/// as [`Tag::Opaque`] and forwarded verbatim.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Tag {
    /// Application payload broadcast to every other occupant.
    General,
    /// Application payload delivered only to the host (slot 0).
    HostMessage,
    PlayerJoined,
    PlayerDisconnect,
    StartGame,
    ChangeSession,
    AssignedSession,
    JoinSession,
    ApiMismatch,
    Opaque(u8),
}

impl Tag {
    pub const GENERAL: u8 = 0;
    pub const HOST_MESSAGE: u8 = 1;
    pub const PLAYER_JOINED: u8 = 50;
    pub const PLAYER_DISCONNECT: u8 = 51;
    pub const START_GAME: u8 = 52;
    pub const CHANGE_SESSION: u8 = 53;
    pub const ASSIGNED_SESSION: u8 = 100;
    pub const JOIN_SESSION: u8 = 101;
    pub const API_MISMATCH: u8 = 102;

    pub fn byte(self) -> u8 {
        u8::from(self)
    }
}

impl From<u8> for Tag {
    fn from(b: u8) -> Self {
        match b {
            Tag::GENERAL => Tag::General,
            Tag::HOST_MESSAGE => Tag::HostMessage,
            Tag::PLAYER_JOINED => Tag::PlayerJoined,
            Tag::PLAYER_DISCONNECT => Tag::PlayerDisconnect,
            Tag::START_GAME => Tag::StartGame,
            Tag::CHANGE_SESSION => Tag::ChangeSession,
            Tag::ASSIGNED_SESSION => Tag::AssignedSession,
            Tag::JOIN_SESSION => Tag::JoinSession,
            Tag::API_MISMATCH => Tag::ApiMismatch,
            other => Tag::Opaque(other),
        }
    }
}

impl From<Tag> for u8 {
    fn from(tag: Tag) -> Self {
        match tag {
            Tag::General => Tag::GENERAL,
            Tag::HostMessage => Tag::HOST_MESSAGE,
            Tag::PlayerJoined => Tag::PLAYER_JOINED,
            Tag::PlayerDisconnect => Tag::PLAYER_DISCONNECT,
            Tag::StartGame => Tag::START_GAME,
            Tag::ChangeSession => Tag::CHANGE_SESSION,
            Tag::AssignedSession => Tag::ASSIGNED_SESSION,
            Tag::JoinSession => Tag::JOIN_SESSION,
            Tag::ApiMismatch => Tag::API_MISMATCH,
            Tag::Opaque(b) => b,
        }
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tag::Opaque(b) => write!(f, "opaque({})", b),
            other => write!(f, "{:?}({})", other, other.byte()),
        }
    }
}
