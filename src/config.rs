//! Simulator catalog.
//!
//! Site configuration mapping simulator kind and version to the installed
//! executable, the MPI launcher for parallel runs, and the environment
//! overrides the binary needs. The catalog is a plain JSON file; lookups
//! hand out an immutable binding for the lifetime of one run.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::RunError;
use crate::model::SimulatorKind;

/// Environment variable naming an alternative catalog file.
pub const CATALOG_ENV: &str = "SIMRUN_CONFIG";

/// Site-wide default catalog location.
pub const DEFAULT_CATALOG_PATH: &str = "/etc/simrun/simulators.json";

/// Resolved launch information for one simulator version.
#[derive(Debug, Clone, Deserialize)]
pub struct SimulatorBinding {
    pub executable: PathBuf,
    #[serde(default)]
    pub mpirun: Option<PathBuf>,
    /// Environment overrides applied to the child process only.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SimulatorEntry {
    versions: HashMap<String, SimulatorBinding>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SimulatorCatalog {
    #[serde(flatten)]
    simulators: HashMap<String, SimulatorEntry>,
}

impl SimulatorCatalog {
    pub fn load(path: &Path) -> Result<Self, RunError> {
        let raw = std::fs::read_to_string(path).map_err(|source| RunError::Catalog {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| RunError::CatalogFormat {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from the standard location: `SIMRUN_CONFIG` when set, the
    /// site-wide default path otherwise.
    pub fn load_default() -> Result<Self, RunError> {
        let path = std::env::var_os(CATALOG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CATALOG_PATH));
        Self::load(&path)
    }

    /// Binding for a serial run.
    pub fn serial(&self, kind: SimulatorKind, version: &str) -> Result<SimulatorBinding, RunError> {
        self.lookup(kind, version)
    }

    /// Binding for a parallel run; the version must also carry an MPI
    /// launcher.
    pub fn parallel(
        &self,
        kind: SimulatorKind,
        version: &str,
    ) -> Result<SimulatorBinding, RunError> {
        let binding = self.lookup(kind, version)?;
        if binding.mpirun.is_none() {
            return Err(RunError::Configuration {
                simulator: format!("parallel {kind}"),
                version: version.to_string(),
            });
        }
        Ok(binding)
    }

    fn lookup(&self, kind: SimulatorKind, version: &str) -> Result<SimulatorBinding, RunError> {
        self.simulators
            .get(kind.as_str())
            .and_then(|entry| entry.versions.get(version))
            .cloned()
            .ok_or_else(|| RunError::Configuration {
                simulator: kind.to_string(),
                version: version.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> SimulatorCatalog {
        serde_json::from_str(
            r#"{
                "ecl100": {
                    "versions": {
                        "2017.1": {
                            "executable": "/opt/ecl/2017.1/bin/eclipse.exe",
                            "mpirun": "/opt/ecl/tools/mpirun",
                            "env": { "F_UFMTENDIAN": "big" }
                        },
                        "2016.2": {
                            "executable": "/opt/ecl/2016.2/bin/eclipse.exe"
                        }
                    }
                },
                "flow": {
                    "versions": {
                        "default": { "executable": "/usr/bin/flow" }
                    }
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn serial_lookup_finds_the_binding() {
        let binding = catalog().serial(SimulatorKind::Ecl100, "2017.1").unwrap();
        assert_eq!(
            binding.executable,
            PathBuf::from("/opt/ecl/2017.1/bin/eclipse.exe")
        );
        assert_eq!(binding.env.get("F_UFMTENDIAN").unwrap(), "big");
    }

    #[test]
    fn unknown_kind_or_version_is_a_configuration_error() {
        let cat = catalog();
        assert!(matches!(
            cat.serial(SimulatorKind::Ecl300, "2017.1"),
            Err(RunError::Configuration { .. })
        ));
        assert!(matches!(
            cat.serial(SimulatorKind::Ecl100, "1999.1"),
            Err(RunError::Configuration { .. })
        ));
    }

    #[test]
    fn parallel_lookup_requires_a_launcher() {
        let cat = catalog();
        assert!(cat.parallel(SimulatorKind::Ecl100, "2017.1").is_ok());
        assert!(matches!(
            cat.parallel(SimulatorKind::Ecl100, "2016.2"),
            Err(RunError::Configuration { .. })
        ));
    }

    #[test]
    fn load_reports_missing_and_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("none.json");
        assert!(matches!(
            SimulatorCatalog::load(&missing),
            Err(RunError::Catalog { .. })
        ));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "not json").unwrap();
        assert!(matches!(
            SimulatorCatalog::load(&bad),
            Err(RunError::CatalogFormat { .. })
        ));
    }
}
