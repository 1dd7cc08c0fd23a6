mod cli;

use clap::Parser;
use cli::{Cli, Commands, MessagePrinter, SeatedActions};
use relay_shared::{ClientPacket, SessionCode};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let first = match &cli.command {
        Commands::Create { api_version } => ClientPacket::CreateSession {
            api_version: *api_version,
        },
        Commands::Join { code, api_version } => ClientPacket::JoinSession {
            code: SessionCode::from(code.as_str()),
            hint: *api_version,
        },
    };

    let actions = SeatedActions {
        start: cli.start,
        general: cli.send.iter().map(|p| p.0.clone()).collect(),
        to_host: cli.to_host.iter().map(|p| p.0.clone()).collect(),
    };

    let mut printer = MessagePrinter::new(cli.json);
    cli::run_ws(&cli.server, first, &actions, cli.wait_ms, cli.watch, &mut printer).await?;
    if printer.received() == 0 {
        eprintln!("No packets received from {}", cli.server);
    }
    Ok(())
}
