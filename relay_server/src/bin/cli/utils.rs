use std::io::IsTerminal;

use relay_shared::ServerPacket;
use relay_server::pretty::format_packet_human;

pub struct MessagePrinter {
    json: bool,
    color: bool,
    received: usize,
}

impl MessagePrinter {
    pub fn new(json: bool) -> Self {
        Self {
            json,
            color: std::io::stdout().is_terminal(),
            received: 0,
        }
    }

    pub fn handle(&mut self, packet: &ServerPacket) {
        self.received += 1;
        if self.json {
            match serde_json::to_string(packet) {
                Ok(json_str) => println!("{}", json_str),
                Err(e) => eprintln!("Failed to serialize packet to JSON: {}", e),
            }
        } else {
            println!("{}", format_packet_human(packet, self.color));
        }
    }

    pub fn received(&self) -> usize {
        self.received
    }
}
