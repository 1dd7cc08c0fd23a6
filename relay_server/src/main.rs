//! Main entry point for the relay server.

use relay_server::{cli, config, server};

use anyhow::Context;
use clap::Parser;
use config::Config;
use server::AppState;
use std::path::PathBuf;

/// Minimal server entrypoint: parse CLI args and run the server.
///
/// Usage:
///   relay-server [--config PATH] [--port PORT] [--static-dir DIR]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::ServerCli::parse();

    // If debug is on: show everything at DEBUG level.
    // Otherwise our crates at INFO and everything else at WARN.
    let log_filter = if cli.debug {
        "debug".to_string()
    } else {
        "relay_server=info,relay_shared=info,warn".to_string()
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(cli.debug)
        .with_thread_ids(cli.debug)
        .with_file(cli.debug)
        .with_line_number(cli.debug)
        .init();

    let config_path: PathBuf = cli.config.clone();

    // Load or create config file (creates file if missing).
    let mut cfg = Config::load_or_create(&config_path)
        .with_context(|| format!("loading or creating config '{}'", config_path.display()))?;

    // Apply CLI overrides in-memory (non-persistent by default)
    if let Some(port) = cli.port {
        cfg.port = port;
    }
    if let Some(dir) = cli.static_dir {
        cfg.static_dir = dir;
    }

    cfg.validate()
        .with_context(|| format!("invalid config '{}'", config_path.display()))?;
    let addr = cfg.socket_addr()?;

    if cli.persist {
        cfg.persist(&config_path)
            .with_context(|| format!("saving updated config '{}'", config_path.display()))?;
    }

    tracing::info!(
        config = %config_path.display(),
        capacity = cfg.default_capacity,
        code_length = cfg.code_length,
        min_api_version = cfg.min_api_version,
        heartbeat_secs = cfg.heartbeat_interval_secs,
        "loaded config"
    );

    let state = AppState::new(cfg, Some(config_path));
    server::run_server(addr, state).await?;
    Ok(())
}
