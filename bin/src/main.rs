//! candela CLI - multi-timeframe OHLCV candle aggregation service.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "candela")]
#[command(about = "Multi-timeframe OHLCV candle aggregation service", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the aggregation service (ingestion, schedulers, publishing)
    Serve,

    /// Detect and repair gaps for all configured symbols, then exit
    Backfill,

    /// Run one retention cleanup round, then exit
    Cleanup,

    /// Refresh the coarse rollup views, then exit
    Refresh,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Serve => commands::serve::run().await,
        Commands::Backfill => commands::backfill::run().await,
        Commands::Cleanup => commands::cleanup::run().await,
        Commands::Refresh => commands::refresh::run().await,
    }
}
