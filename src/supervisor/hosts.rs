//! MPI host discovery and machine file generation.
//!
//! Under an LSF allocation the scheduler publishes its host assignment in
//! `LSB_MCPU_HOSTS` (alternating `host cpus` pairs) and/or `LSB_HOSTS` (a
//! flat host list, one entry per slot). Outside a scheduler the local host
//! is repeated once per requested CPU.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::RunError;

/// Expand `host1 n1 host2 n2 ...` into one entry per CPU slot.
fn expand_mcpu_hosts(raw: &str) -> Option<Vec<String>> {
    let tokens: Vec<&str> = raw.split_whitespace().collect();
    let mut hosts = Vec::new();
    for pair in tokens.chunks_exact(2) {
        let count: usize = pair[1].parse().ok()?;
        for _ in 0..count {
            hosts.push(pair[0].to_string());
        }
    }
    Some(hosts)
}

/// Build the host list for a parallel launch. The paired list wins when its
/// expansion covers the request exactly, then the flat list; a scheduler
/// allocation that covers neither is an inconsistent request. Without any
/// scheduler hints the local hostname is repeated.
pub fn machine_list(
    num_cpu: usize,
    lsb_mcpu_hosts: Option<&str>,
    lsb_hosts: Option<&str>,
) -> Result<Vec<String>, RunError> {
    if lsb_mcpu_hosts.is_none() && lsb_hosts.is_none() {
        let localhost = hostname::get()?.to_string_lossy().into_owned();
        return Ok(vec![localhost; num_cpu]);
    }

    let mismatch = || RunError::HostList {
        requested: num_cpu,
        mcpu_hosts: lsb_mcpu_hosts.map(str::to_string),
        hosts: lsb_hosts.map(str::to_string),
    };

    let mcpu_list = expand_mcpu_hosts(lsb_mcpu_hosts.unwrap_or("")).ok_or_else(mismatch)?;
    if mcpu_list.len() == num_cpu {
        return Ok(mcpu_list);
    }

    let flat_list: Vec<String> = lsb_hosts
        .unwrap_or("")
        .split_whitespace()
        .map(str::to_string)
        .collect();
    if flat_list.len() == num_cpu {
        return Ok(flat_list);
    }

    Err(mismatch())
}

/// Read the scheduler hints from the process environment. A variable that
/// is set but empty counts as absent.
pub fn machine_list_from_env(num_cpu: usize) -> Result<Vec<String>, RunError> {
    let mcpu = std::env::var("LSB_MCPU_HOSTS")
        .ok()
        .filter(|s| !s.trim().is_empty());
    let hosts = std::env::var("LSB_HOSTS")
        .ok()
        .filter(|s| !s.trim().is_empty());
    machine_list(num_cpu, mcpu.as_deref(), hosts.as_deref())
}

/// Write `<base>.mpi` in the run directory, one host per line, and return
/// its path. The file is consumed by the MPI launcher and left behind as a
/// run artifact.
pub fn write_machine_file(
    run_path: &Path,
    base_name: &str,
    hosts: &[String],
) -> Result<PathBuf, RunError> {
    let path = run_path.join(format!("{base_name}.mpi"));
    let mut file = std::fs::File::create(&path)?;
    for host in hosts {
        writeln!(file, "{host}")?;
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paired_hosts_expand_with_per_host_repetition() {
        let hosts = machine_list(6, Some("nodeA 4 nodeB 2"), None).unwrap();
        assert_eq!(hosts.len(), 6);
        assert_eq!(hosts[..4], vec!["nodeA"; 4][..]);
        assert_eq!(hosts[4..], vec!["nodeB"; 2][..]);
    }

    #[test]
    fn flat_list_is_used_when_the_paired_list_does_not_match() {
        let hosts = machine_list(3, Some("nodeA 4"), Some("n1 n2 n3")).unwrap();
        assert_eq!(hosts, vec!["n1", "n2", "n3"]);
    }

    #[test]
    fn mismatched_scheduler_hints_are_rejected() {
        let err = machine_list(8, Some("nodeA 4"), Some("n1 n2")).unwrap_err();
        assert!(matches!(err, RunError::HostList { requested: 8, .. }));

        // A garbled cpu-count token is the same inconsistency.
        let err = machine_list(2, Some("nodeA four"), None).unwrap_err();
        assert!(matches!(err, RunError::HostList { .. }));
    }

    #[test]
    fn no_scheduler_hints_fall_back_to_the_local_host() {
        let hosts = machine_list(4, None, None).unwrap();
        assert_eq!(hosts.len(), 4);
        assert!(hosts.iter().all(|h| h == &hosts[0]));
        assert!(!hosts[0].is_empty());
    }

    #[test]
    fn machine_file_has_one_line_per_slot() {
        let dir = tempfile::tempdir().unwrap();
        for num_cpu in 2..=5 {
            let hosts = machine_list(num_cpu, None, None).unwrap();
            let path = write_machine_file(dir.path(), "CASE", &hosts).unwrap();
            assert_eq!(path, dir.path().join("CASE.mpi"));
            let written = std::fs::read_to_string(&path).unwrap();
            assert_eq!(written.lines().count(), num_cpu);
        }
    }
}
