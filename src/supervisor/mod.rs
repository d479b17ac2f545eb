//! Run lifecycle supervision.
//!
//! Owns one simulator run from binding resolution to the completion
//! sentinel: launch the child with its working directory, environment
//! overrides and log redirection in place, poll until it exits, check the
//! end-of-run report, and write `<base>.OK`. Exactly one child is tracked
//! per supervisor instance; the caller owns any retry policy.

pub(crate) mod hosts;
pub(crate) mod report;
pub(crate) mod summary;

use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};

use crate::config::{SimulatorBinding, SimulatorCatalog};
use crate::error::RunError;
use crate::model::{RunRequest, RunState};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_SUMMARY_TIMEOUT: Duration = Duration::from_secs(15);

/// Sentinel contents for a checked and an unchecked run.
const SENTINEL_CHECKED: &str = "simulation OK";
const SENTINEL_UNCHECKED: &str = "simulation complete - NOT checked for errors.";

pub struct RunSupervisor {
    request: RunRequest,
    binding: SimulatorBinding,
    parser: report::ReportParser,
    state: RunState,
    poll_interval: Duration,
    summary_timeout: Duration,
}

impl RunSupervisor {
    /// Resolve the simulator binding for the request. A serial run needs an
    /// executable, a parallel run additionally the MPI launcher.
    pub fn prepare(catalog: &SimulatorCatalog, request: RunRequest) -> Result<Self, RunError> {
        let binding = if request.num_cpu == 1 {
            catalog.serial(request.mode.simulator, &request.version)?
        } else {
            catalog.parallel(request.mode.simulator, &request.version)?
        };
        tracing::info!(
            simulator = %request.mode.simulator,
            version = %request.version,
            executable = %binding.executable.display(),
            "resolved simulator binding"
        );
        Ok(RunSupervisor {
            request,
            binding,
            parser: report::ReportParser::new(),
            state: RunState::Resolved,
            poll_interval: DEFAULT_POLL_INTERVAL,
            summary_timeout: DEFAULT_SUMMARY_TIMEOUT,
        })
    }

    /// Override the wait cadence (exit-status polls and the summary check).
    pub fn with_intervals(mut self, poll_interval: Duration, summary_timeout: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.summary_timeout = summary_timeout;
        self
    }

    /// Run to completion and return the child's exit code.
    pub async fn run(mut self) -> Result<i32, RunError> {
        match self.run_inner().await {
            Ok(code) => {
                self.transition(RunState::Completed);
                Ok(code)
            }
            Err(e) => {
                self.transition(RunState::Failed);
                Err(e)
            }
        }
    }

    async fn run_inner(&mut self) -> Result<i32, RunError> {
        let child = self.launch()?;
        let exit_status = self.supervise(child).await?;

        if self.request.mode.check_status {
            if exit_status != 0 {
                return Err(RunError::LaunchFailure {
                    executable: self.binding.executable.clone(),
                    status: exit_status,
                });
            }

            let outcome = self.parser.verify(
                &self.request.run_path,
                &self.request.base_name,
                self.request.mode.simulator,
            )?;
            self.transition(RunState::Verified);
            tracing::info!(
                errors = outcome.errors,
                bugs = outcome.bugs,
                "end-of-run report verified"
            );

            if self.request.num_cpu > 1 {
                let summary_path =
                    summary::summary_file(&self.request.run_path, &self.request.base_name);
                let stable =
                    summary::await_stable(&summary_path, self.summary_timeout, self.poll_interval)
                        .await;
                if stable.is_none() {
                    // Tolerated: a dry run never writes a summary.
                    tracing::warn!(
                        path = %summary_path.display(),
                        "summary file never stabilized, accepting the run"
                    );
                }
            }

            self.write_sentinel(SENTINEL_CHECKED)?;
        } else {
            self.write_sentinel(SENTINEL_UNCHECKED)?;
        }

        Ok(exit_status)
    }

    /// Spawn the simulator (or the MPI launcher wrapping it) with stdout
    /// and stderr redirected to `<base>.LOG` / `<base>.stderr` in the run
    /// directory.
    fn launch(&mut self) -> Result<Child, RunError> {
        let deck = self.request.deck_path();
        match std::fs::File::open(&deck) {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RunError::MissingInput(deck))
            }
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Err(RunError::PermissionDenied(deck))
            }
            Err(e) => return Err(e.into()),
        }

        let stdout_log = self.open_log(&format!("{}.LOG", self.request.base_name))?;
        let stderr_log = self.open_log(&format!("{}.stderr", self.request.base_name))?;

        let mut command = if self.request.num_cpu == 1 {
            let mut command = Command::new(&self.binding.executable);
            command.arg(&self.request.base_name);
            command
        } else {
            let hosts = hosts::machine_list_from_env(self.request.num_cpu)?;
            let machine_file = format!("{}.mpi", self.request.base_name);
            hosts::write_machine_file(&self.request.run_path, &self.request.base_name, &hosts)?;
            tracing::debug!(machine_file = %machine_file, slots = hosts.len(), "wrote machine file");

            let mpirun = self.binding.mpirun.as_ref().ok_or_else(|| {
                RunError::Configuration {
                    simulator: format!("parallel {}", self.request.mode.simulator),
                    version: self.request.version.clone(),
                }
            })?;
            let mut command = Command::new(mpirun);
            command
                .arg("-machinefile")
                .arg(machine_file)
                .arg("-np")
                .arg(self.request.num_cpu.to_string())
                .arg(&self.binding.executable)
                .arg(&self.request.base_name);
            command
        };

        let child = command
            .current_dir(&self.request.run_path)
            .envs(&self.binding.env)
            .stdout(Stdio::from(stdout_log))
            .stderr(Stdio::from(stderr_log))
            .spawn()?;
        tracing::info!(pid = child.id(), "launched simulator");
        self.transition(RunState::Launched);
        Ok(child)
    }

    /// Poll the child with a bounded sleep until it exits. No busy spin and
    /// no overall timeout: a long simulation is simply a long wait.
    async fn supervise(&mut self, mut child: Child) -> Result<i32, RunError> {
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            tokio::time::sleep(self.poll_interval).await;
        };
        let code = decode_exit(status);
        self.transition(RunState::Terminated);
        tracing::info!(code, "simulator exited");
        Ok(code)
    }

    fn open_log(&self, name: &str) -> Result<std::fs::File, RunError> {
        let path = self.request.run_path.join(name);
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o644);
        }
        Ok(options.open(path)?)
    }

    fn write_sentinel(&self, content: &str) -> Result<(), RunError> {
        let path = self
            .request
            .run_path
            .join(format!("{}.OK", self.request.base_name));
        std::fs::write(&path, content)?;
        tracing::info!(path = %path.display(), "wrote completion sentinel");
        Ok(())
    }

    fn transition(&mut self, next: RunState) {
        tracing::debug!(from = ?self.state, to = ?next, "run state");
        self.state = next;
    }
}

/// Exit code the caller should observe. A signal-terminated child maps to
/// the conventional `128 + signal`.
fn decode_exit(status: std::process::ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    status.code().unwrap_or(1)
}
