use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong between parsing the invocation and writing
/// the completion sentinel. Nothing here is retried; the caller owns any
/// retry policy.
#[derive(Debug, Error)]
pub enum RunError {
    /// The binary was invoked under an unrecognized name, or the arguments
    /// violate a basic constraint (e.g. a CPU count of zero).
    #[error("invalid invocation: {0}")]
    InvalidInvocation(String),

    /// The simulator catalog could not be read.
    #[error("can not load simulator catalog {}: {source}", .path.display())]
    Catalog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The simulator catalog is not valid JSON of the expected shape.
    #[error("invalid simulator catalog {}: {source}", .path.display())]
    CatalogFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// No usable binding for the requested simulator kind and version.
    #[error("no configured {simulator} simulator for version {version}")]
    Configuration { simulator: String, version: String },

    #[error("no such input deck: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("input deck is not readable: {}", .0.display())]
    PermissionDenied(PathBuf),

    /// The scheduler's host hints do not cover the requested CPU count.
    #[error(
        "host list does not match the requested {requested} cpus \
         (LSB_MCPU_HOSTS: {mcpu_hosts:?}, LSB_HOSTS: {hosts:?})"
    )]
    HostList {
        requested: usize,
        mcpu_hosts: Option<String>,
        hosts: Option<String>,
    },

    /// The child exited non-zero while failure checking was enabled.
    #[error("the simulator executable {} exited with error status {status}", .executable.display())]
    LaunchFailure { executable: PathBuf, status: i32 },

    /// The end-of-run report exists but carries no Errors/Bugs summary.
    #[error("end-of-run report {} has no Errors/Bugs summary", .0.display())]
    ReportParse(PathBuf),

    /// The end-of-run report shows a non-zero error or bug count. The
    /// message carries the count and, for errors, the aggregated report
    /// excerpts.
    #[error("simulation failed with {message}")]
    SimulationFailed { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
