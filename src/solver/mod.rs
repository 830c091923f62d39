//! External solver adapters.
//!
//! Each adapter knows one solver binary: its option table, its command line
//! and where it leaves its output. The rest of the pipeline only talks to
//! the [`SolverAdapter`] trait.

mod params;
mod tree_search;
mod voxel;

pub use params::{FlagStyle, OptionKind, OptionSpec, ParamValue, ParameterSet, Resolved, ResolvedParams};
pub use tree_search::TreeSearchSolverAdapter;
pub use voxel::VoxelSolverAdapter;

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// File name of the serialized source mesh inside a run directory.
pub const INPUT_FILE_NAME: &str = "src.obj";

/// File name of the captured solver stdout/stderr inside a run directory.
pub const LOG_FILE_NAME: &str = "solver.log";

/// The supported solvers.
///
/// Names are matched case-insensitively, both by [`FromStr`] and when read
/// from a config file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum SolverKind {
    /// V-HACD, voxel based.
    #[default]
    Vhacd,
    /// CoACD, tree-search based.
    Coacd,
}

impl SolverKind {
    /// Builds the adapter for this solver from the configured binary paths.
    #[must_use]
    pub fn adapter(self, paths: &SolverPaths) -> Arc<dyn SolverAdapter> {
        match self {
            Self::Vhacd => Arc::new(VoxelSolverAdapter::new(paths.vhacd.clone())),
            Self::Coacd => Arc::new(TreeSearchSolverAdapter::new(paths.coacd.clone())),
        }
    }

    /// Display name, as the host UI shows it.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Vhacd => "VHACD",
            Self::Coacd => "CoACD",
        }
    }
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SolverKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("vhacd") {
            Ok(Self::Vhacd)
        } else if s.eq_ignore_ascii_case("coacd") {
            Ok(Self::Coacd)
        } else {
            Err(ConfigError::UnknownSolver(s.to_string()))
        }
    }
}

impl TryFrom<String> for SolverKind {
    type Error = ConfigError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        name.parse()
    }
}

/// Binary locations, as kept in the host's preference store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SolverPaths {
    /// Path to the V-HACD `TestVHACD` executable.
    pub vhacd: PathBuf,
    /// Path to the CoACD `main` executable.
    pub coacd: PathBuf,
}

/// Where a solver leaves its hulls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLayout {
    /// One file holding every hull as a separate `o` section.
    Sectioned(PathBuf),
    /// One file per hull named `<prefix><n>.<extension>` inside `dir`.
    PerHull {
        dir: PathBuf,
        prefix: String,
        extension: String,
    },
}

impl OutputLayout {
    /// Lists the output files that actually exist, in hull order.
    ///
    /// An empty list means the solver produced nothing at the declared
    /// location.
    #[must_use]
    pub fn locate(&self) -> SolverOutputs {
        match self {
            Self::Sectioned(path) => SolverOutputs {
                per_hull: false,
                files: if path.is_file() {
                    vec![path.clone()]
                } else {
                    Vec::new()
                },
                numbers: Vec::new(),
            },
            Self::PerHull {
                dir,
                prefix,
                extension,
            } => {
                let mut numbered: Vec<(u64, PathBuf)> = std::fs::read_dir(dir)
                    .into_iter()
                    .flatten()
                    .filter_map(|entry| entry.ok().map(|e| e.path()))
                    .filter(|path| path.is_file())
                    .filter_map(|path| {
                        let n = hull_file_number(&path, prefix, extension)?;
                        Some((n, path))
                    })
                    .collect();
                numbered.sort_by_key(|(n, _)| *n);
                let (numbers, files) = numbered.into_iter().unzip();
                SolverOutputs {
                    per_hull: true,
                    files,
                    numbers,
                }
            }
        }
    }
}

fn hull_file_number(path: &Path, prefix: &str, extension: &str) -> Option<u64> {
    if path.extension()?.to_str()? != extension {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let digits = stem.strip_prefix(prefix)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Output files found after a solver run, normalized for the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolverOutputs {
    /// `true` if each file holds exactly one hull.
    pub per_hull: bool,
    /// Files in hull order.
    pub files: Vec<PathBuf>,
    /// Hull number taken from each per-hull file name, parallel to `files`.
    /// Empty for sectioned output.
    pub numbers: Vec<u64>,
}

/// A fully built solver command. Constructed per run, never reused.
#[derive(Debug, Clone)]
pub struct SolverInvocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub input: PathBuf,
    pub output: OutputLayout,
    pub working_dir: PathBuf,
    /// Receives the solver's stdout and stderr.
    pub log: PathBuf,
    pub timeout: Option<Duration>,
}

/// Capability set shared by every solver variant.
pub trait SolverAdapter: fmt::Debug + Send + Sync {
    /// Which solver this adapter drives.
    fn kind(&self) -> SolverKind;

    /// Configured path of the solver executable.
    fn binary(&self) -> &Path;

    /// Options the solver recognizes, in command-line order.
    fn options(&self) -> &'static [OptionSpec];

    /// Declares where the solver will write its hulls for a run in `run_dir`.
    fn output_layout(&self, run_dir: &Path) -> OutputLayout;

    /// Builds the argument list, excluding the program itself.
    fn arguments(&self, params: &ResolvedParams, input: &Path, output: &OutputLayout) -> Vec<OsString>;

    /// Validates the binary and the parameters without touching the filesystem
    /// beyond a metadata lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::BinaryNotFound`] if the binary does not resolve
    /// to an executable, or a parameter error from [`ResolvedParams::resolve`].
    fn check(&self, params: &ParameterSet) -> Result<ResolvedParams, ConfigError> {
        let solver = self.kind().name();
        check_binary(solver, self.binary())?;
        ResolvedParams::resolve(solver, self.options(), params)
    }

    /// Builds the full invocation for a run in `run_dir`.
    fn invocation(&self, params: &ResolvedParams, run_dir: &Path, timeout: Option<Duration>) -> SolverInvocation {
        let input = run_dir.join(INPUT_FILE_NAME);
        let output = self.output_layout(run_dir);
        SolverInvocation {
            program: self.binary().to_path_buf(),
            args: self.arguments(params, &input, &output),
            input,
            output,
            working_dir: run_dir.to_path_buf(),
            log: run_dir.join(LOG_FILE_NAME),
            timeout,
        }
    }
}

/// Checks that `path` names an executable regular file.
///
/// # Errors
///
/// Returns [`ConfigError::BinaryNotFound`] otherwise.
pub fn check_binary(solver: &'static str, path: &Path) -> Result<(), ConfigError> {
    let not_found = || ConfigError::BinaryNotFound {
        solver,
        path: path.to_path_buf(),
    };
    if path.as_os_str().is_empty() {
        return Err(not_found());
    }
    let meta = std::fs::metadata(path).map_err(|_| not_found())?;
    if !meta.is_file() {
        return Err(not_found());
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if meta.permissions().mode() & 0o111 == 0 {
            return Err(not_found());
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn scratch() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("convex-decomp-solver-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn solver_kind_parses_ui_names() {
        assert_eq!("VHACD".parse::<SolverKind>().unwrap(), SolverKind::Vhacd);
        assert_eq!("CoACD".parse::<SolverKind>().unwrap(), SolverKind::Coacd);
        assert!(matches!(
            "bullet".parse::<SolverKind>(),
            Err(ConfigError::UnknownSolver(_))
        ));
    }

    #[test]
    fn empty_binary_path_is_not_found() {
        let err = check_binary("VHACD", Path::new("")).unwrap_err();
        assert!(matches!(err, ConfigError::BinaryNotFound { .. }));
    }

    #[test]
    fn missing_binary_is_not_found() {
        let err = check_binary("VHACD", Path::new("/nonexistent/TestVHACD")).unwrap_err();
        assert!(matches!(err, ConfigError::BinaryNotFound { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn non_executable_file_is_not_found() {
        let dir = scratch();
        let path = dir.join("TestVHACD");
        std::fs::write(&path, "").unwrap();
        assert!(check_binary("VHACD", &path).is_err());
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn sectioned_layout_reports_missing_file() {
        let dir = scratch();
        let outputs = OutputLayout::Sectioned(dir.join("decomp.obj")).locate();
        assert!(outputs.files.is_empty());
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn per_hull_layout_orders_numerically() {
        let dir = scratch();
        for name in ["hull10.obj", "hull2.obj", "hull0.obj", "hull.obj", "other1.obj", "hull1.stl"] {
            std::fs::write(dir.join(name), "").unwrap();
        }
        let outputs = OutputLayout::PerHull {
            dir: dir.clone(),
            prefix: "hull".into(),
            extension: "obj".into(),
        }
        .locate();
        let names: Vec<_> = outputs
            .files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert!(outputs.per_hull);
        assert_eq!(names, ["hull0.obj", "hull2.obj", "hull10.obj"]);
        assert_eq!(outputs.numbers, [0, 2, 10]);
        std::fs::remove_dir_all(dir).unwrap();
    }
}
