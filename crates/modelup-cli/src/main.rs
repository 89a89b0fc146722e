//! modelup CLI

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use modelup_cli::context::Context;
use modelup_cli::{Cli, Commands, cmd};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_filter = if cli.global.verbose {
        "modelup_cli=debug,modelup_core=debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Hash { files } => cmd::hash::hash(&files),
        Commands::Check => cmd::check::check(&Context::from_args(&cli.global)?).await,
        Commands::Update => cmd::update::update(&Context::from_args(&cli.global)?).await,
        Commands::Status => cmd::status::status(&Context::from_args(&cli.global)?).await,
    }
}
