//! Tag-prefixed binary packets exchanged over the relay socket.
//!
//! There is no length prefix: the transport frames each packet, and every tag
//! defines its own payload shape. Decoding never allocates for relayed
//! payloads; it only borrows from the received frame.

use serde::{Deserialize, Serialize};

use crate::{CodecError, SessionCode, Tag};

/// Outcome carried by a join-session response.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum JoinStatus {
    /// Admitted as a new participant.
    Success { occupants: u8, slot: u8 },
    NotFound,
    Full,
    /// Reconnected into a previously held seat.
    Rejoined,
    ReconnectRejected,
}

impl JoinStatus {
    pub fn byte(self) -> u8 {
        match self {
            JoinStatus::Success { .. } => 0,
            JoinStatus::NotFound => 1,
            JoinStatus::Full => 2,
            JoinStatus::Rejoined => 3,
            JoinStatus::ReconnectRejected => 4,
        }
    }
}

/// A packet sent by a client, borrowed from the received frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientPacket<'a> {
    CreateSession { api_version: u8 },
    /// `hint` is the client's API version while the session is in the lobby
    /// and the requested slot index once the session has started.
    JoinSession { code: SessionCode, hint: u8 },
    DisconnectSelf,
    ChangeSession,
    StartGame { payload: &'a [u8] },
    HostMessage { payload: &'a [u8] },
    /// Any tag without relay semantics of its own, forwarded to the room.
    Relay { tag: Tag, payload: &'a [u8] },
    /// A server-to-client tag that a client has no business sending.
    Unexpected(Tag),
}

impl<'a> ClientPacket<'a> {
    /// Decode a client frame. `code_len` is the configured session code width.
    pub fn decode(buf: &'a [u8], code_len: usize) -> Result<Self, CodecError> {
        let (&first, payload) = buf.split_first().ok_or(CodecError::Empty)?;
        let tag = Tag::from(first);
        let packet = match tag {
            Tag::AssignedSession => {
                need(tag, payload, 1)?;
                ClientPacket::CreateSession {
                    api_version: payload[0],
                }
            }
            Tag::JoinSession => {
                need(tag, payload, code_len + 1)?;
                ClientPacket::JoinSession {
                    code: SessionCode::from_bytes(&payload[..code_len]),
                    hint: payload[code_len],
                }
            }
            Tag::PlayerDisconnect => ClientPacket::DisconnectSelf,
            Tag::ChangeSession => ClientPacket::ChangeSession,
            Tag::StartGame => ClientPacket::StartGame { payload },
            Tag::HostMessage => ClientPacket::HostMessage { payload },
            Tag::General | Tag::Opaque(_) => ClientPacket::Relay { tag, payload },
            Tag::PlayerJoined | Tag::ApiMismatch => ClientPacket::Unexpected(tag),
        };
        Ok(packet)
    }

    pub fn tag(&self) -> Tag {
        match self {
            ClientPacket::CreateSession { .. } => Tag::AssignedSession,
            ClientPacket::JoinSession { .. } => Tag::JoinSession,
            ClientPacket::DisconnectSelf => Tag::PlayerDisconnect,
            ClientPacket::ChangeSession => Tag::ChangeSession,
            ClientPacket::StartGame { .. } => Tag::StartGame,
            ClientPacket::HostMessage { .. } => Tag::HostMessage,
            ClientPacket::Relay { tag, .. } => *tag,
            ClientPacket::Unexpected(tag) => *tag,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![self.tag().byte()];
        match self {
            ClientPacket::CreateSession { api_version } => out.push(*api_version),
            ClientPacket::JoinSession { code, hint } => {
                out.extend_from_slice(code.as_bytes());
                out.push(*hint);
            }
            ClientPacket::StartGame { payload }
            | ClientPacket::HostMessage { payload }
            | ClientPacket::Relay { payload, .. } => out.extend_from_slice(payload),
            ClientPacket::DisconnectSelf
            | ClientPacket::ChangeSession
            | ClientPacket::Unexpected(_) => {}
        }
        out
    }
}

/// A packet produced by the server, or relayed through it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "data")]
pub enum ServerPacket {
    SessionAssigned { code: SessionCode },
    JoinResponse(JoinStatus),
    ApiMismatch,
    PlayerJoined { slot: u8 },
    PlayerDisconnected { slot: u8 },
    /// Application payload forwarded from another participant.
    Relayed { tag: u8, payload: Vec<u8> },
}

impl ServerPacket {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            ServerPacket::SessionAssigned { code } => {
                let mut out = vec![Tag::ASSIGNED_SESSION];
                out.extend_from_slice(code.as_bytes());
                out
            }
            ServerPacket::JoinResponse(status) => match status {
                JoinStatus::Success { occupants, slot } => {
                    vec![Tag::JOIN_SESSION, status.byte(), *occupants, *slot]
                }
                other => vec![Tag::JOIN_SESSION, other.byte()],
            },
            ServerPacket::ApiMismatch => vec![Tag::API_MISMATCH],
            ServerPacket::PlayerJoined { slot } => vec![Tag::PLAYER_JOINED, *slot],
            ServerPacket::PlayerDisconnected { slot } => vec![Tag::PLAYER_DISCONNECT, *slot],
            ServerPacket::Relayed { tag, payload } => {
                let mut out = Vec::with_capacity(1 + payload.len());
                out.push(*tag);
                out.extend_from_slice(payload);
                out
            }
        }
    }

    /// Decode a server frame, as seen by a client.
    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let (&first, payload) = buf.split_first().ok_or(CodecError::Empty)?;
        let tag = Tag::from(first);
        let packet = match tag {
            Tag::AssignedSession => {
                need(tag, payload, 1)?;
                ServerPacket::SessionAssigned {
                    code: SessionCode::from_bytes(payload),
                }
            }
            Tag::JoinSession => {
                need(tag, payload, 1)?;
                let status = match payload[0] {
                    0 => {
                        need(tag, payload, 3)?;
                        JoinStatus::Success {
                            occupants: payload[1],
                            slot: payload[2],
                        }
                    }
                    1 => JoinStatus::NotFound,
                    2 => JoinStatus::Full,
                    3 => JoinStatus::Rejoined,
                    4 => JoinStatus::ReconnectRejected,
                    other => return Err(CodecError::UnknownStatus(other)),
                };
                ServerPacket::JoinResponse(status)
            }
            Tag::ApiMismatch => ServerPacket::ApiMismatch,
            Tag::PlayerJoined => {
                need(tag, payload, 1)?;
                ServerPacket::PlayerJoined { slot: payload[0] }
            }
            Tag::PlayerDisconnect => {
                need(tag, payload, 1)?;
                ServerPacket::PlayerDisconnected { slot: payload[0] }
            }
            Tag::General
            | Tag::HostMessage
            | Tag::StartGame
            | Tag::ChangeSession
            | Tag::Opaque(_) => ServerPacket::Relayed {
                tag: first,
                payload: payload.to_vec(),
            },
        };
        Ok(packet)
    }
}

fn need(tag: Tag, payload: &[u8], needed: usize) -> Result<(), CodecError> {
    if payload.len() < needed {
        return Err(CodecError::Truncated {
            tag,
            needed,
            got: payload.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer_is_rejected() {
        assert_eq!(ClientPacket::decode(&[], 5), Err(CodecError::Empty));
        assert_eq!(ServerPacket::decode(&[]), Err(CodecError::Empty));
    }

    #[test]
    fn create_request_needs_version_byte() {
        assert_eq!(
            ClientPacket::decode(&[Tag::ASSIGNED_SESSION], 5),
            Err(CodecError::Truncated {
                tag: Tag::AssignedSession,
                needed: 1,
                got: 0
            })
        );
        assert_eq!(
            ClientPacket::decode(&[Tag::ASSIGNED_SESSION, 2], 5),
            Ok(ClientPacket::CreateSession { api_version: 2 })
        );
    }

    #[test]
    fn join_request_splits_code_and_hint() {
        let buf = [Tag::JOIN_SESSION, b'0', b'1', b'2', b'3', b'4', 9, 0xff];
        let packet = ClientPacket::decode(&buf, 5).unwrap();
        assert_eq!(
            packet,
            ClientPacket::JoinSession {
                code: SessionCode::from("01234"),
                hint: 9
            }
        );

        let short = [Tag::JOIN_SESSION, b'0', b'1', b'2', b'3', b'4'];
        assert!(matches!(
            ClientPacket::decode(&short, 5),
            Err(CodecError::Truncated { needed: 6, got: 5, .. })
        ));
    }

    #[test]
    fn unknown_tags_are_relayed_with_payload() {
        let buf = [200, 1, 2, 3];
        assert_eq!(
            ClientPacket::decode(&buf, 5),
            Ok(ClientPacket::Relay {
                tag: Tag::Opaque(200),
                payload: &[1, 2, 3]
            })
        );
        assert_eq!(
            ClientPacket::decode(&[Tag::HOST_MESSAGE, 7], 5),
            Ok(ClientPacket::HostMessage { payload: &[7] })
        );
    }

    #[test]
    fn server_only_tags_from_client_are_unexpected() {
        assert_eq!(
            ClientPacket::decode(&[Tag::PLAYER_JOINED, 1], 5),
            Ok(ClientPacket::Unexpected(Tag::PlayerJoined))
        );
        assert_eq!(
            ClientPacket::decode(&[Tag::API_MISMATCH], 5),
            Ok(ClientPacket::Unexpected(Tag::ApiMismatch))
        );
    }

    #[test]
    fn join_response_layout() {
        let ok = ServerPacket::JoinResponse(JoinStatus::Success {
            occupants: 2,
            slot: 1,
        });
        assert_eq!(ok.encode(), vec![Tag::JOIN_SESSION, 0, 2, 1]);
        assert_eq!(
            ServerPacket::JoinResponse(JoinStatus::Rejoined).encode(),
            vec![Tag::JOIN_SESSION, 3]
        );
        assert_eq!(
            ServerPacket::decode(&[Tag::JOIN_SESSION, 4]),
            Ok(ServerPacket::JoinResponse(JoinStatus::ReconnectRejected))
        );
        assert_eq!(
            ServerPacket::decode(&[Tag::JOIN_SESSION, 9]),
            Err(CodecError::UnknownStatus(9))
        );
    }

    #[test]
    fn assigned_code_is_the_rest_of_the_frame() {
        let frame = ServerPacket::SessionAssigned {
            code: SessionCode::from("04821"),
        }
        .encode();
        assert_eq!(frame, b"\x6404821".to_vec());
        match ServerPacket::decode(&frame) {
            Ok(ServerPacket::SessionAssigned { code }) => assert_eq!(code.as_str(), "04821"),
            other => panic!("unexpected decode: {other:?}"),
        }
    }

    #[test]
    fn server_packets_serialize_for_cli_output() {
        let json = serde_json::to_string(&ServerPacket::PlayerJoined { slot: 3 }).unwrap();
        assert_eq!(json, r#"{"type":"PlayerJoined","data":{"slot":3}}"#);
    }
}
