use owo_colors::OwoColorize;
use relay_shared::{JoinStatus, ServerPacket, Tag};

fn status_text(status: JoinStatus) -> String {
    match status {
        JoinStatus::Success { occupants, slot } => {
            format!("joined as slot {} ({} players present)", slot, occupants)
        }
        JoinStatus::NotFound => "no such session".to_string(),
        JoinStatus::Full => "session is full".to_string(),
        JoinStatus::Rejoined => "rejoined previous seat".to_string(),
        JoinStatus::ReconnectRejected => "reconnect rejected".to_string(),
    }
}

fn format_payload(payload: &[u8]) -> String {
    if payload.is_empty() {
        return "(empty)".to_string();
    }
    let hex = hex::encode(payload);
    match std::str::from_utf8(payload) {
        Ok(text) if text.chars().all(|c| !c.is_control()) => format!("{} {:?}", hex, text),
        _ => hex,
    }
}

fn label(text: &str, color: bool, paint: fn(&str) -> String) -> String {
    if color {
        paint(text)
    } else {
        text.to_string()
    }
}

/// One-line human rendering of a packet received from the relay.
pub fn format_packet_human(packet: &ServerPacket, color: bool) -> String {
    match packet {
        ServerPacket::SessionAssigned { code } => format!(
            "{} session code {}",
            label("ASSIGNED", color, |s| s.green().bold().to_string()),
            if color {
                code.as_str().bold().to_string()
            } else {
                code.to_string()
            }
        ),
        ServerPacket::JoinResponse(status) => {
            let paint: fn(&str) -> String = match status {
                JoinStatus::Success { .. } | JoinStatus::Rejoined => |s| s.green().to_string(),
                _ => |s| s.red().to_string(),
            };
            format!("{} {}", label("JOIN", color, paint), status_text(*status))
        }
        ServerPacket::ApiMismatch => format!(
            "{} server refused our api version",
            label("MISMATCH", color, |s| s.red().bold().to_string())
        ),
        ServerPacket::PlayerJoined { slot } => format!(
            "{} slot {}",
            label("+PLAYER", color, |s| s.cyan().to_string()),
            slot
        ),
        ServerPacket::PlayerDisconnected { slot } => format!(
            "{} slot {}",
            label("-PLAYER", color, |s| s.yellow().to_string()),
            slot
        ),
        ServerPacket::Relayed { tag, payload } => format!(
            "{} {} {}",
            label("RELAY", color, |s| s.dimmed().to_string()),
            Tag::from(*tag),
            format_payload(payload)
        ),
    }
}
