mod cli;
mod config;
mod error;
mod model;
mod supervisor;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = cli::Cli::parse();
    let mode = cli::invocation_mode()?;
    let status = cli::run(mode, args).await?;

    // The wrapper stands in for the simulator, so the caller sees the
    // simulator's own exit code.
    std::process::exit(status);
}
