//! claimguard - land claim registry tooling
//!
//! Operator CLI over a world's claim store

mod cli;
mod config;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use config::ClaimsConfig;
use tracing::info;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ClaimsConfig::load_from_path(&cli.config);

    // RUST_LOG wins over the filter from the config file.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new(&config.log_filter))
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting claimguard v{}", env!("CARGO_PKG_VERSION"));

    for line in cli::run(cli, &config)? {
        println!("{line}");
    }
    Ok(())
}
