use anyhow::Result;
use clap::{Parser, Subcommand};
use flightwatch_sync::PollerConfig;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "flightwatch")]
#[command(about = "Regional flight poller: discovers new flights and stores their detail records")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Poll continuously until Ctrl-C.
    Run,
    /// Run a single cycle and print its summary.
    Once,
    /// Print the configured bounds.
    Bounds,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let cancel = CancellationToken::new();
            let trigger = cancel.clone();
            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => info!("ctrl-c received, stopping; current cycle will not rotate"),
                    Err(err) => warn!(error = %err, "listening for ctrl-c failed, stopping"),
                }
                trigger.cancel();
            });
            let cycles = flightwatch_sync::run_from_env(cancel).await?;
            println!("poller stopped after {cycles} cycles");
        }
        Commands::Once => {
            let summary = flightwatch_sync::run_once_from_env().await?;
            println!(
                "cycle complete: cycle_id={} regions={} failed_regions={} observed={} new={} persisted={} abandoned={} failed={} skipped={}",
                summary.cycle_id,
                summary.regions,
                summary.failed_regions,
                summary.observed,
                summary.new_flights,
                summary.persisted,
                summary.abandoned,
                summary.failed,
                summary.skipped
            );
        }
        Commands::Bounds => {
            let config = PollerConfig::from_env();
            let bounds = flightwatch_core::load_bounds(&config.bounds_file)?;
            for (index, bound) in bounds.iter().enumerate() {
                println!("{index}\t{bound}\tbounds={}", bound.query_value());
            }
        }
    }

    Ok(())
}
