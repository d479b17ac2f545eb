use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::RunError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulatorKind {
    Ecl100,
    Ecl300,
    Flow,
}

impl SimulatorKind {
    /// Catalog key for this engine.
    pub fn as_str(self) -> &'static str {
        match self {
            SimulatorKind::Ecl100 => "ecl100",
            SimulatorKind::Ecl300 => "ecl300",
            SimulatorKind::Flow => "flow",
        }
    }

    /// File name of the end-of-run report for a case base name. The ECLIPSE
    /// family writes a dedicated ECLEND file; flow only has the print file.
    pub fn end_report_name(self, base_name: &str) -> String {
        match self {
            SimulatorKind::Flow => format!("{base_name}.PRT"),
            SimulatorKind::Ecl100 | SimulatorKind::Ecl300 => format!("{base_name}.ECLEND"),
        }
    }
}

impl std::fmt::Display for SimulatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the invocation name selects: which engine to run and whether the
/// end-of-run report is checked for failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunMode {
    pub simulator: SimulatorKind,
    pub check_status: bool,
}

impl RunMode {
    /// Map an invocation name (argv[0] basename) to a run mode. The binary
    /// is installed once and symlinked under these six names.
    pub fn from_invocation(name: &str) -> Result<Self, RunError> {
        let (simulator, check_status) = match name {
            "run_ecl100" => (SimulatorKind::Ecl100, true),
            "run_ecl100_nocheck" => (SimulatorKind::Ecl100, false),
            "run_ecl300" => (SimulatorKind::Ecl300, true),
            "run_ecl300_nocheck" => (SimulatorKind::Ecl300, false),
            "run_flow" => (SimulatorKind::Flow, true),
            "run_flow_nocheck" => (SimulatorKind::Flow, false),
            other => {
                return Err(RunError::InvalidInvocation(format!(
                    "unrecognized invocation name {other:?} - \
                     must be one of run_ecl100, run_ecl300 or run_flow, \
                     optionally with a _nocheck suffix"
                )))
            }
        };
        Ok(RunMode {
            simulator,
            check_status,
        })
    }
}

/// One validated request to run a simulator case.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub mode: RunMode,
    pub version: String,
    /// Absolute directory the case runs in.
    pub run_path: PathBuf,
    /// Deck file name inside `run_path`, extension included.
    pub data_file: String,
    /// Deck file name with the extension stripped; every produced file
    /// (logs, machine file, sentinel) derives from this.
    pub base_name: String,
    pub num_cpu: usize,
}

impl RunRequest {
    pub fn new(
        mode: RunMode,
        version: &str,
        deck_arg: &str,
        num_cpu: usize,
    ) -> Result<Self, RunError> {
        if num_cpu < 1 {
            return Err(RunError::InvalidInvocation(
                "cpu count must be at least 1".into(),
            ));
        }

        let deck = resolve_deck_name(deck_arg);
        let deck_path = Path::new(&deck);
        match std::fs::File::open(deck_path) {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RunError::MissingInput(deck_path.to_path_buf()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Err(RunError::PermissionDenied(deck_path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        }

        let data_file = deck_path
            .file_name()
            .ok_or_else(|| RunError::MissingInput(deck_path.to_path_buf()))?
            .to_string_lossy()
            .into_owned();
        let base_name = Path::new(&data_file)
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy()
            .into_owned();

        let run_path = match deck_path.parent() {
            Some(p) if p.as_os_str().is_empty() => std::env::current_dir()?,
            Some(p) => std::path::absolute(p)?,
            None => std::env::current_dir()?,
        };

        Ok(RunRequest {
            mode,
            version: version.to_string(),
            run_path,
            data_file,
            base_name,
            num_cpu,
        })
    }

    pub fn deck_path(&self) -> PathBuf {
        self.run_path.join(&self.data_file)
    }
}

/// Resolve a deck reference to a concrete file name: a recognized extension
/// is kept as-is, otherwise one is appended with the casing implied by the
/// reference itself.
pub fn resolve_deck_name(deck_arg: &str) -> String {
    if deck_arg.ends_with(".data") || deck_arg.ends_with(".DATA") {
        return deck_arg.to_string();
    }
    if is_lowercase_name(deck_arg) {
        format!("{deck_arg}.data")
    } else {
        format!("{deck_arg}.DATA")
    }
}

/// True when the reference contains at least one alphabetic character and
/// no uppercase ones.
fn is_lowercase_name(s: &str) -> bool {
    s.chars().any(|c| c.is_alphabetic()) && !s.chars().any(|c| c.is_uppercase())
}

/// Error and bug counts parsed from the end-of-run report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    pub errors: u64,
    pub bugs: u64,
}

impl RunOutcome {
    pub fn passed(&self) -> bool {
        self.errors == 0 && self.bugs == 0
    }
}

/// Lifecycle of a single supervised run. Completed and Failed are terminal;
/// Failed is reached from Resolved (catalog lookup), Launched (bad exit
/// status) or Verified (report shows errors or bugs).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Requested,
    Resolved,
    Launched,
    Terminated,
    Verified,
    Completed,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invocation_names_map_to_engine_and_check_flag() {
        let cases = [
            ("run_ecl100", SimulatorKind::Ecl100, true),
            ("run_ecl100_nocheck", SimulatorKind::Ecl100, false),
            ("run_ecl300", SimulatorKind::Ecl300, true),
            ("run_ecl300_nocheck", SimulatorKind::Ecl300, false),
            ("run_flow", SimulatorKind::Flow, true),
            ("run_flow_nocheck", SimulatorKind::Flow, false),
        ];
        for (name, simulator, check) in cases {
            let mode = RunMode::from_invocation(name).unwrap();
            assert_eq!(mode.simulator, simulator, "{name}");
            assert_eq!(mode.check_status, check, "{name}");
        }
    }

    #[test]
    fn unknown_invocation_name_is_rejected() {
        let err = RunMode::from_invocation("run_frontsim").unwrap_err();
        assert!(matches!(err, RunError::InvalidInvocation(_)));
        assert!(err.to_string().contains("run_frontsim"));
    }

    #[test]
    fn deck_extension_casing_follows_the_reference() {
        assert_eq!(resolve_deck_name("case"), "case.data");
        assert_eq!(resolve_deck_name("CASE"), "CASE.DATA");
        assert_eq!(resolve_deck_name("Case"), "Case.DATA");
        // Recognized extensions are kept untouched.
        assert_eq!(resolve_deck_name("case.data"), "case.data");
        assert_eq!(resolve_deck_name("CASE.DATA"), "CASE.DATA");
        // Only the exact casings count as an extension.
        assert_eq!(resolve_deck_name("CASE.Data"), "CASE.Data.DATA");
        // No alphabetic character means no lowercase claim.
        assert_eq!(resolve_deck_name("1234"), "1234.DATA");
    }

    #[test]
    fn end_report_name_depends_on_engine() {
        assert_eq!(SimulatorKind::Ecl100.end_report_name("CASE"), "CASE.ECLEND");
        assert_eq!(SimulatorKind::Ecl300.end_report_name("CASE"), "CASE.ECLEND");
        assert_eq!(SimulatorKind::Flow.end_report_name("CASE"), "CASE.PRT");
    }

    #[test]
    fn request_validates_cpu_count_and_deck_presence() {
        let err = RunRequest::new(
            RunMode::from_invocation("run_ecl100").unwrap(),
            "2017.1",
            "CASE",
            0,
        )
        .unwrap_err();
        assert!(matches!(err, RunError::InvalidInvocation(_)));

        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("NOSUCH");
        let err = RunRequest::new(
            RunMode::from_invocation("run_ecl100").unwrap(),
            "2017.1",
            missing.to_str().unwrap(),
            1,
        )
        .unwrap_err();
        assert!(matches!(err, RunError::MissingInput(_)));
    }

    #[test]
    fn request_splits_run_path_and_base_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("CASE.DATA"), "RUNSPEC\n").unwrap();

        let deck = dir.path().join("CASE");
        let request = RunRequest::new(
            RunMode::from_invocation("run_ecl100").unwrap(),
            "2017.1",
            deck.to_str().unwrap(),
            2,
        )
        .unwrap();

        assert_eq!(request.run_path, dir.path());
        assert_eq!(request.data_file, "CASE.DATA");
        assert_eq!(request.base_name, "CASE");
        assert_eq!(request.num_cpu, 2);
    }
}
