use std::time::Duration;

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use relay_shared::{ClientPacket, ServerPacket, Tag};
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use super::utils::MessagePrinter;

/// Try to build a websocket URL from a base string (like "localhost:8080" or "http://host:8080")
pub fn build_ws_url(base: &str) -> anyhow::Result<Url> {
    let mut url = Url::parse(base).or_else(|_| Url::parse(&format!("http://{}", base)))?;

    match url.scheme() {
        "http" => url.set_scheme("ws").ok(),
        "https" => url.set_scheme("wss").ok(),
        "ws" | "wss" => Some(()),
        _ => None,
    }
    .ok_or_else(|| anyhow::anyhow!("Unsupported URL scheme: {}", url.scheme()))?;

    // Force path to /ws
    if url.path() != "/ws" {
        url.set_path("/ws");
    }
    Ok(url)
}

/// What to send once the server has seated us.
#[derive(Debug, Clone, Default)]
pub struct SeatedActions {
    pub start: bool,
    pub general: Vec<Vec<u8>>,
    pub to_host: Vec<Vec<u8>>,
}

impl SeatedActions {
    fn frames(&self) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();
        if self.start {
            frames.push(ClientPacket::StartGame { payload: &[] }.encode());
        }
        for p in &self.general {
            frames.push(
                ClientPacket::Relay {
                    tag: Tag::General,
                    payload: p,
                }
                .encode(),
            );
        }
        for p in &self.to_host {
            frames.push(ClientPacket::HostMessage { payload: p }.encode());
        }
        frames
    }
}

/// Whether `packet` means the server has given us a seat.
fn is_seated(packet: &ServerPacket) -> bool {
    use relay_shared::JoinStatus;
    matches!(
        packet,
        ServerPacket::SessionAssigned { .. }
            | ServerPacket::JoinResponse(JoinStatus::Success { .. })
            | ServerPacket::JoinResponse(JoinStatus::Rejoined)
    )
}

/// Connect, send `first`, then print every packet until the connection goes
/// quiet for `wait_ms` (or closes, when `watch` is set). Follow-up frames are
/// sent as soon as the server seats us.
pub async fn run_ws(
    server: &str,
    first: ClientPacket<'_>,
    actions: &SeatedActions,
    wait_ms: u64,
    watch: bool,
    printer: &mut MessagePrinter,
) -> anyhow::Result<()> {
    let ws_url = build_ws_url(server)?;
    let (ws_stream, _resp) = tokio_tungstenite::connect_async(ws_url.as_str())
        .await
        .with_context(|| format!("connecting to {}", ws_url))?;
    let (mut write, mut read) = ws_stream.split();

    write.send(Message::Binary(first.encode())).await?;

    let mut pending = Some(actions.frames());
    loop {
        let next = if watch {
            Ok(read.next().await)
        } else {
            tokio::time::timeout(Duration::from_millis(wait_ms), read.next()).await
        };
        match next {
            Ok(Some(Ok(Message::Binary(frame)))) => match ServerPacket::decode(&frame) {
                Ok(packet) => {
                    printer.handle(&packet);
                    if is_seated(&packet) {
                        for frame in pending.take().unwrap_or_default() {
                            write.send(Message::Binary(frame)).await?;
                        }
                    }
                }
                Err(e) => eprintln!("Undecodable packet from server: {}", e),
            },
            Ok(Some(Ok(Message::Close(_)))) | Ok(None) => {
                eprintln!("Server closed the connection");
                break;
            }
            Ok(Some(Ok(_other))) => { /* pings are answered by tungstenite */ }
            Ok(Some(Err(e))) => {
                eprintln!("WebSocket error: {}", e);
                break;
            }
            Err(_) => break, // quiet for wait_ms
        }
    }

    let _ = write.send(Message::Close(None)).await;
    Ok(())
}
