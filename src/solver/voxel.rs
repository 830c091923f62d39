use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::params::{FlagStyle, OptionKind, OptionSpec, ResolvedParams};
use super::{OutputLayout, SolverAdapter, SolverKind};

/// File V-HACD writes into its working directory.
const OUTPUT_FILE_NAME: &str = "decomp.obj";

/// Options of V-HACD's `TestVHACD` front end.
static OPTIONS: [OptionSpec; 9] = [
    OptionSpec {
        name: "voxel_resolution",
        flag: "-r",
        kind: OptionKind::Int {
            min: 1,
            max: i64::MAX,
            default: Some(100_000),
        },
        style: FlagStyle::Value,
    },
    OptionSpec {
        name: "max_hulls",
        flag: "-h",
        kind: OptionKind::Int {
            min: 1,
            max: 1024,
            default: Some(64),
        },
        style: FlagStyle::Value,
    },
    OptionSpec {
        name: "max_recursion_depth",
        flag: "-d",
        kind: OptionKind::Int {
            min: 1,
            max: i64::MAX,
            default: Some(10),
        },
        style: FlagStyle::Value,
    },
    OptionSpec {
        name: "max_hull_vertices",
        flag: "-v",
        kind: OptionKind::Int {
            min: 1,
            max: i64::MAX,
            default: Some(64),
        },
        style: FlagStyle::Value,
    },
    OptionSpec {
        name: "min_edge_length",
        flag: "-l",
        kind: OptionKind::Int {
            min: 1,
            max: i64::MAX,
            default: Some(2),
        },
        style: FlagStyle::Value,
    },
    OptionSpec {
        name: "volume_error_percent",
        flag: "-e",
        kind: OptionKind::Float {
            min: 0.001,
            max: 10.0,
            default: Some(10.0),
        },
        style: FlagStyle::Value,
    },
    OptionSpec {
        name: "shrinkwrap",
        flag: "-s",
        kind: OptionKind::Bool {
            default: Some(true),
        },
        style: FlagStyle::BoolValue,
    },
    OptionSpec {
        name: "optimal_split",
        flag: "-p",
        kind: OptionKind::Bool {
            default: Some(false),
        },
        style: FlagStyle::BoolValue,
    },
    OptionSpec {
        name: "fill_mode",
        flag: "-f",
        kind: OptionKind::Choice {
            choices: &["flood", "surface", "raycast"],
            default: Some("flood"),
        },
        style: FlagStyle::Value,
    },
];

/// Drives the voxel-based V-HACD solver.
///
/// `TestVHACD <input> [options]` always writes `decomp.obj` into its working
/// directory, one `o` section per hull.
#[derive(Debug, Clone)]
pub struct VoxelSolverAdapter {
    binary: PathBuf,
}

impl VoxelSolverAdapter {
    /// Creates an adapter for the `TestVHACD` executable at `binary`.
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl SolverAdapter for VoxelSolverAdapter {
    fn kind(&self) -> SolverKind {
        SolverKind::Vhacd
    }

    fn binary(&self) -> &Path {
        &self.binary
    }

    fn options(&self) -> &'static [OptionSpec] {
        &OPTIONS
    }

    fn output_layout(&self, run_dir: &Path) -> OutputLayout {
        OutputLayout::Sectioned(run_dir.join(OUTPUT_FILE_NAME))
    }

    fn arguments(&self, params: &ResolvedParams, input: &Path, _output: &OutputLayout) -> Vec<OsString> {
        let mut args = vec![input.as_os_str().to_os_string()];
        args.extend(params.to_args());
        // Run the solver's worker thread and keep its log on stdout.
        for flag in ["-a", "true", "-g", "true"] {
            args.push(flag.into());
        }
        args
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::solver::ParameterSet;

    #[test]
    fn default_command_line() {
        let adapter = VoxelSolverAdapter::new("/opt/vhacd/TestVHACD");
        let params = ResolvedParams::resolve("VHACD", adapter.options(), &ParameterSet::new()).unwrap();
        let inv = adapter.invocation(&params, Path::new("/tmp/run"), None);

        let args: Vec<_> = inv.args.iter().map(|a| a.to_str().unwrap()).collect();
        assert_eq!(
            args,
            [
                "/tmp/run/src.obj", "-r", "100000", "-h", "64", "-d", "10", "-v", "64", "-l", "2",
                "-e", "10", "-s", "true", "-p", "false", "-f", "flood", "-a", "true", "-g", "true",
            ]
        );
        assert_eq!(inv.working_dir, Path::new("/tmp/run"));
        assert_eq!(
            inv.output,
            OutputLayout::Sectioned(PathBuf::from("/tmp/run/decomp.obj"))
        );
    }

    #[test]
    fn fill_mode_must_be_known() {
        let adapter = VoxelSolverAdapter::new("/opt/vhacd/TestVHACD");
        let params = ParameterSet::new().with("fill_mode", "magic");
        assert!(ResolvedParams::resolve("VHACD", adapter.options(), &params).is_err());
    }

    #[test]
    fn volume_error_range_is_enforced() {
        let adapter = VoxelSolverAdapter::new("/opt/vhacd/TestVHACD");
        let params = ParameterSet::new().with("volume_error_percent", 25.0);
        assert!(ResolvedParams::resolve("VHACD", adapter.options(), &params).is_err());
    }

    #[test]
    fn missing_binary_fails_check() {
        let adapter = VoxelSolverAdapter::new("/nonexistent/TestVHACD");
        assert!(matches!(
            adapter.check(&ParameterSet::new()),
            Err(crate::error::ConfigError::BinaryNotFound { solver: "VHACD", .. })
        ));
    }
}
