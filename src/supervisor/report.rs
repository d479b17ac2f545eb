//! End-of-run report parsing.
//!
//! After the simulator exits, its own report is the authority on whether the
//! run succeeded: the ECLIPSE family summarizes error and bug counts in
//! `<base>.ECLEND`, flow appends the same summary to its `<base>.PRT` print
//! file. When the summary shows errors, the print file also carries one
//! `@--  ERROR ... AT TIME ... DAYS` block per occurrence; those blocks are
//! aggregated into the failure message.

use std::path::{Path, PathBuf};

use regex::Regex;

use crate::error::RunError;
use crate::model::{RunOutcome, SimulatorKind};

/// Separator between aggregated error blocks in the failure message.
const BLOCK_SEPARATOR: &str = "\n\n...\n\n";

/// Precompiled patterns for the report formats. Construct once per
/// supervisor and reuse.
pub struct ReportParser {
    errors_line: Regex,
    bugs_line: Regex,
    error_block: Regex,
}

impl Default for ReportParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportParser {
    pub fn new() -> Self {
        ReportParser {
            errors_line: Regex::new(r"^\s*Errors\s+(\d+)\s*$").expect("static pattern"),
            bugs_line: Regex::new(r"^\s*Bugs\s+(\d+)\s*$").expect("static pattern"),
            error_block: Regex::new(
                r"(?m)^\s@--  ERROR\s+AT TIME\s+(?P<days>\d+\.\d+)\s+DAYS\s+\((?P<date>(.+)):\s*$(\s^\s@.+$)*",
            )
            .expect("static pattern"),
        }
    }

    /// Extract the last-seen error and bug counts from the end-of-run
    /// report. A report without both lines is malformed.
    pub fn read_end_report(
        &self,
        run_path: &Path,
        base_name: &str,
        kind: SimulatorKind,
    ) -> Result<RunOutcome, RunError> {
        let path = run_path.join(kind.end_report_name(base_name));
        let content = std::fs::read_to_string(&path)?;

        let mut errors: Option<u64> = None;
        let mut bugs: Option<u64> = None;
        for line in content.lines() {
            if let Some(caps) = self.errors_line.captures(line) {
                errors = caps[1].parse().ok();
            }
            if let Some(caps) = self.bugs_line.captures(line) {
                bugs = caps[1].parse().ok();
            }
        }

        match (errors, bugs) {
            (Some(errors), Some(bugs)) => Ok(RunOutcome { errors, bugs }),
            _ => Err(RunError::ReportParse(path)),
        }
    }

    /// Collect every error block from the print file, in order.
    pub fn collect_error_blocks(&self, prt_path: &Path) -> Result<Vec<String>, RunError> {
        let content = std::fs::read_to_string(prt_path)?;
        Ok(self
            .error_block
            .find_iter(&content)
            .map(|m| m.as_str().to_string())
            .collect())
    }

    /// Check the end-of-run report and fail on any error or bug. The error
    /// message aggregates the report's error blocks so the caller sees the
    /// simulator's own diagnostics.
    pub fn verify(
        &self,
        run_path: &Path,
        base_name: &str,
        kind: SimulatorKind,
    ) -> Result<RunOutcome, RunError> {
        let outcome = self.read_end_report(run_path, base_name, kind)?;

        if outcome.errors > 0 {
            let prt_path = prt_file(run_path, base_name);
            let blocks = self.collect_error_blocks(&prt_path).unwrap_or_default();
            return Err(RunError::SimulationFailed {
                message: format!(
                    "{} errors:\n\n{}",
                    outcome.errors,
                    blocks.join(BLOCK_SEPARATOR)
                ),
            });
        }
        if outcome.bugs > 0 {
            return Err(RunError::SimulationFailed {
                message: format!("{} bugs", outcome.bugs),
            });
        }
        Ok(outcome)
    }
}

/// Path of the print file, the source of the detailed error blocks.
pub fn prt_file(run_path: &Path, base_name: &str) -> PathBuf {
    run_path.join(format!("{base_name}.PRT"))
}
