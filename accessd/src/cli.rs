//! Operator-facing CLI: check a shard configuration file, run the
//! coordination layer against a persisted configuration, or drive a
//! one-shot shard group split (spec §2 "an operator-facing cli/main
//! binary").

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use accessd_config::{load, CoordinatorOptions};
use accessd_metrics::{render_all, CoordinatorMetrics};
use clap::{Parser, Subcommand};
use thiserror::Error;
use tokio::select;
use tokio::signal::ctrl_c;
use tracing::{error, info};

use crate::client_factory::DemoClientFactory;
use crate::coordinator::DistributedOperationCoordinator;
use crate::file_backed::{
    FileEventDeleter, FileEventPersister, FileEventReader, IdleWriterAdmin, LoggingOperationRouter,
};
use crate::hasher;
use crate::shard_client_manager::ShardClientManager;
use crate::sighup::Sighup;
use crate::splitter::{ShardGroupSplitter, SplitParameters};

#[derive(Parser, Debug)]
#[command(name = "accessd", version, about = "Distributed coordination layer for a sharded access-management service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Validate a shard configuration file without starting anything.
    ConfigCheck {
        /// Path to the shard configuration JSON file.
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Build the Shard Client Manager from a persisted configuration and
    /// hold it ready, reloading on SIGHUP, until interrupted. The HTTP/RPC
    /// surface that would route real traffic through the resulting
    /// coordinator is out of scope for this binary (spec §1).
    Run {
        /// Path to the shard configuration JSON file.
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Run a one-shot rebalance of a hash range from a source event log to
    /// a target event log (spec §4.5). Uses the file-backed collaborator
    /// implementations in [`crate::file_backed`] — a deployment's real
    /// shard transport replaces these.
    Split {
        /// Source event log (newline-delimited JSON).
        #[arg(long)]
        source: PathBuf,

        /// Target event log (newline-delimited JSON).
        #[arg(long)]
        target: PathBuf,

        /// Inclusive lower bound of the hash range to move.
        #[arg(long)]
        hash_range_start: i32,

        /// Inclusive upper bound of the hash range to move.
        #[arg(long)]
        hash_range_end: i32,

        /// Events copied per batch.
        #[arg(long, default_value_t = 500)]
        event_batch_size: usize,

        /// Drain poll attempts before giving up.
        #[arg(long, default_value_t = 10)]
        retry_attempts: u32,

        /// Milliseconds between drain polls.
        #[arg(long, default_value_t = 1000)]
        retry_interval_ms: u64,

        /// Move every Group event regardless of hash, instead of filtering
        /// them by range like User events.
        #[arg(long)]
        no_filter_group_events: bool,
    },
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("failed to load shard configuration: {0}")]
    Config(#[from] accessd_config::ConfigError),

    #[error(transparent)]
    Manager(#[from] crate::shard_client_manager::ManagerError),

    #[error(transparent)]
    Split(#[from] crate::splitter::SplitError),

    #[error("failed to install SIGHUP handler: {0}")]
    Signal(#[source] std::io::Error),
}

/// Validate a shard configuration file (spec §4.2 `validate()`).
pub fn config_check(path: &PathBuf) -> Result<(), CliError> {
    let set = load(path)?;
    info!(assignments = set.len(), path = %path.display(), "shard configuration is valid");
    Ok(())
}

/// Build the manager/coordinator from a persisted configuration and hold
/// them ready, refreshing on SIGHUP until interrupted (spec §4.3
/// `refreshConfiguration`).
pub async fn run(path: &PathBuf) -> Result<(), CliError> {
    let initial = load(path)?;
    let options = CoordinatorOptions::default();
    let metrics = Arc::new(CoordinatorMetrics::new(options.metrics_enabled));

    let manager = Arc::new(ShardClientManager::construct(
        initial,
        Box::new(DemoClientFactory),
        hasher::from_kind(options.user_hasher),
        hasher::from_kind(options.group_hasher),
        metrics.clone(),
    )?);
    let _coordinator = DistributedOperationCoordinator::new(manager.clone(), metrics.clone());

    info!(path = %path.display(), "coordinator initialized; awaiting SIGHUP to reload configuration");

    let mut sighup = Sighup::new().map_err(CliError::Signal)?;
    loop {
        select! {
            _ = sighup.listen() => {
                info!(path = %path.display(), "SIGHUP received, reloading shard configuration");
                match load(path) {
                    Ok(new_config) => match manager.refresh_configuration(new_config) {
                        Ok(()) => info!("shard configuration refreshed"),
                        Err(err) => error!(%err, "shard configuration refresh rejected, previous configuration remains live"),
                    },
                    Err(err) => error!(%err, "failed to reload shard configuration file"),
                }
            }
            _ = ctrl_c() => {
                info!("shutting down");
                return Ok(());
            }
        }
    }
}

/// Run a one-shot split against the file-backed collaborators (spec §4.5).
#[allow(clippy::too_many_arguments)]
pub async fn split(
    source: PathBuf,
    target: PathBuf,
    hash_range_start: i32,
    hash_range_end: i32,
    event_batch_size: usize,
    retry_attempts: u32,
    retry_interval_ms: u64,
    filter_group_events_by_hash_range: bool,
) -> Result<(), CliError> {
    let metrics = Arc::new(CoordinatorMetrics::new(true));
    let reader = Arc::new(FileEventReader::new(&source));
    let persister = Arc::new(FileEventPersister::new(&target));
    let deleter = Arc::new(FileEventDeleter::new(&source));
    let router = Arc::new(LoggingOperationRouter);
    let writer_admin = Arc::new(IdleWriterAdmin);

    let params = SplitParameters {
        hash_range_start,
        hash_range_end,
        filter_group_events_by_hash_range,
        event_batch_size,
        source_writer_ops_complete_check_retry_attempts: retry_attempts,
        source_writer_ops_complete_check_retry_interval: Duration::from_millis(retry_interval_ms),
    };

    let mut splitter = ShardGroupSplitter::new(reader, persister, deleter, router, writer_admin, metrics.clone(), params)?;
    splitter.run().await?;

    info!(state = ?splitter.state(), "split complete");
    info!("{}", render_all(&metrics.all()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_config_check() {
        let cli = Cli::parse_from(["accessd", "config-check", "--config", "shards.json"]);
        assert!(matches!(cli.command, Commands::ConfigCheck { .. }));
    }

    #[test]
    fn cli_parses_split_with_defaults() {
        let cli = Cli::parse_from([
            "accessd",
            "split",
            "--source",
            "source.ndjson",
            "--target",
            "target.ndjson",
            "--hash-range-start",
            "0",
            "--hash-range-end",
            "1000",
        ]);
        match cli.command {
            Commands::Split {
                event_batch_size,
                retry_attempts,
                ..
            } => {
                assert_eq!(event_batch_size, 500);
                assert_eq!(retry_attempts, 10);
            }
            other => panic!("expected Split, got {other:?}"),
        }
    }
}
