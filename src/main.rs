//! Command-line entry point for draining a node's counter shards.

use clap::Parser;
use countermove::{MigrationConfig, MigrationOrchestrator, RedisCounterStore};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "countermove",
    about = "Move one node's counter shard contributions to another cluster, live"
)]
struct Args {
    /// Source cluster node to drain counters from.
    #[arg(long)]
    from: String,

    /// Target cluster endpoint receiving the values.
    #[arg(long)]
    to: String,

    /// How many operations to keep in flight against the clusters.
    #[arg(short = 'n', long = "connections", default_value_t = 32)]
    connections: usize,

    /// Seconds to let a target increment converge before the source copy is
    /// destroyed.
    #[arg(long, default_value_t = 10)]
    propagation_delay_secs: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let source = match RedisCounterStore::connect(&args.from).await {
        Ok(store) => Arc::new(store),
        Err(err) => {
            error!(addr = %args.from, error = %err, "failed to connect to source");
            return ExitCode::FAILURE;
        }
    };
    let target = match RedisCounterStore::connect(&args.to).await {
        Ok(store) => Arc::new(store),
        Err(err) => {
            error!(addr = %args.to, error = %err, "failed to connect to target");
            return ExitCode::FAILURE;
        }
    };

    let config = MigrationConfig::new()
        .with_concurrency(args.connections)
        .with_propagation_delay(Duration::from_secs(args.propagation_delay_secs));

    let orchestrator = MigrationOrchestrator::new(source, target, config);
    match orchestrator.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "migration failed");
            ExitCode::FAILURE
        }
    }
}
