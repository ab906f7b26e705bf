//! rtsweep - Main Entry Point
//!
//! Model-selection sweep harness for retention-time prediction.

use clap::Parser;
use rtsweep::cli::{run, Cli};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rtsweep=info".into()),
        )
        .init();

    let cli = Cli::parse();
    run(cli)
}
