//! `docrag`: chunk, index and chat with local documents.

mod cli;
mod commands;
mod telemetry;

use clap::Parser;

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    telemetry::init(cli.global.log_format)?;
    let config = cli.global.resolve_config()?;

    match cli.command {
        Command::Chunks(args) => commands::chunks(&config, args).await,
        Command::Tokens(args) => commands::tokens(args),
        Command::Index(args) => commands::index(&config, args).await,
        Command::Inspect => commands::inspect(&config).await,
        Command::Chat(args) => commands::chat(&config, args).await,
    }
}
