use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use crate::config::SimulatorCatalog;
use crate::error::RunError;
use crate::model::{RunMode, RunRequest};
use crate::supervisor::RunSupervisor;

#[derive(Debug, Parser, Clone)]
#[command(
    name = "simrun",
    version,
    about = "Run a reservoir-simulator case and verify its end-of-run report",
    after_help = "The binary is installed under six names - run_ecl100, run_ecl300, \
run_flow and their _nocheck variants - and the invocation name selects the \
engine and whether the end-of-run report is checked for failures."
)]
pub struct Cli {
    /// Simulator version to resolve in the catalog
    pub version: String,

    /// Input deck, with or without the .DATA extension
    pub deck: String,

    /// Number of cpus; more than one launches through the MPI runner
    #[arg(default_value_t = 1)]
    pub num_cpu: usize,

    /// Simulator catalog path (overrides SIMRUN_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Interval between child exit-status polls
    #[arg(long, default_value = "1s")]
    pub poll_interval: humantime::Duration,

    /// How long a parallel run may take to produce a stable summary file
    #[arg(long, default_value = "15s")]
    pub summary_timeout: humantime::Duration,
}

/// Run mode implied by the name this binary was invoked under.
pub fn invocation_mode() -> Result<RunMode, RunError> {
    let argv0 = std::env::args_os().next().unwrap_or_default();
    let name = Path::new(&argv0)
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .into_owned();
    RunMode::from_invocation(&name)
}

/// Resolve, launch, supervise and verify one run; returns the exit code to
/// mirror to the caller.
pub async fn run(mode: RunMode, args: Cli) -> Result<i32> {
    let catalog = match args.config.as_deref() {
        Some(path) => SimulatorCatalog::load(path)?,
        None => SimulatorCatalog::load_default()?,
    };

    let request = RunRequest::new(mode, &args.version, &args.deck, args.num_cpu)?;
    let code = RunSupervisor::prepare(&catalog, request)?
        .with_intervals(
            Duration::from(args.poll_interval),
            Duration::from(args.summary_timeout),
        )
        .run()
        .await?;
    Ok(code)
}
