use clap::Parser;
use std::path::PathBuf;

/// Server CLI for relay-server
#[derive(Parser, Debug, Clone)]
#[command(name = "relay-server", version, about = "Multiplayer session relay server")]
pub struct ServerCli {
    /// Path to config file
    #[arg(long, default_value = "relay-server.toml")]
    pub config: PathBuf,

    /// Listen port (overrides config.port)
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Directory of static client assets (overrides config.static_dir)
    #[arg(long)]
    pub static_dir: Option<String>,

    /// Verbose logging with targets, threads and source locations
    #[arg(long, default_value_t = false)]
    pub debug: bool,

    /// Persist CLI overrides back to the config file
    #[arg(long, default_value_t = false)]
    pub persist: bool,
}
