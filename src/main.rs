mod cli;
mod commands;
mod countdown;
mod model;
mod storage;
mod ui;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    init_tracing();
    let args = cli::Cli::parse();
    let command = args.command.unwrap_or(cli::Command::Note);
    match command {
        cli::Command::Note => commands::note(),
        cli::Command::Add { text, deadline } => commands::add(text, deadline),
        cli::Command::List => commands::list(),
        cli::Command::Done { index } => commands::done(index),
        cli::Command::Path => commands::path(),
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
