use clap::{Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(name = "relay-cli", version, about = "Headless client for poking at a relay server", long_about = None)]
pub struct Cli {
    /// Server address. Accepts ws(s):// URLs or http(s):// bases, which are
    /// converted to the matching websocket URL with path /ws.
    #[arg(long, default_value = "http://localhost:8080")]
    pub server: String,

    /// How long to keep printing packets after the last one arrived (ms)
    #[arg(long, default_value_t = 1500)]
    pub wait_ms: u64,

    /// Keep printing until the server closes the connection
    #[arg(long, default_value_t = false)]
    pub watch: bool,

    /// Output JSON instead of human-readable text
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Send start-game once seated
    #[arg(long, default_value_t = false)]
    pub start: bool,

    /// Hex payload to broadcast once seated, as a general message (repeatable)
    #[arg(long = "send", value_name = "HEX")]
    pub send: Vec<Payload>,

    /// Hex payload to deliver to the host once seated (repeatable)
    #[arg(long = "to-host", value_name = "HEX")]
    pub to_host: Vec<Payload>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Create a new session and print its code
    Create {
        #[arg(long, default_value_t = 0)]
        api_version: u8,
    },
    /// Join an existing session by code
    Join {
        code: String,
        /// API version while the session is in the lobby, or the seat to
        /// reclaim once it has started
        #[arg(long, default_value_t = 0)]
        api_version: u8,
    },
}

/// Raw bytes given on the command line as hex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload(pub Vec<u8>);

impl std::str::FromStr for Payload {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s.strip_prefix("0x").unwrap_or(s);
        hex::decode(s)
            .map(Payload)
            .map_err(|e| format!("invalid hex payload '{}': {}", s, e))
    }
}
