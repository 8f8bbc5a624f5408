//! `accessd` binary entry point: parses the operator CLI and installs the
//! `tracing` subscriber the rest of the crate logs through (spec §4.7).

use clap::Parser;
use tracing_subscriber::EnvFilter;

use accessd::cli::{config_check, run, split, Cli, Commands};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::ConfigCheck { config } => config_check(&config).map_err(Box::<dyn std::error::Error>::from),
        Commands::Run { config } => run(&config).await.map_err(Box::<dyn std::error::Error>::from),
        Commands::Split {
            source,
            target,
            hash_range_start,
            hash_range_end,
            event_batch_size,
            retry_attempts,
            retry_interval_ms,
            no_filter_group_events,
        } => split(
            source,
            target,
            hash_range_start,
            hash_range_end,
            event_batch_size,
            retry_attempts,
            retry_interval_ms,
            !no_filter_group_events,
        )
        .await
        .map_err(Box::<dyn std::error::Error>::from),
    };

    if let Err(err) = result {
        tracing::error!(%err, "accessd exited with an error");
        std::process::exit(1);
    }
}
