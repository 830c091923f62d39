use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::params::{FlagStyle, OptionKind, OptionSpec, ResolvedParams};
use super::{OutputLayout, SolverAdapter, SolverKind};

const OUTPUT_FILE_NAME: &str = "hulls.obj";

static OPTIONS: [OptionSpec; 13] = [
    OptionSpec {
        name: "threshold",
        flag: "-t",
        kind: OptionKind::Float {
            min: 0.01,
            max: 1.0,
            default: Some(0.05),
        },
        style: FlagStyle::Value,
    },
    OptionSpec {
        name: "k",
        flag: "-k",
        kind: OptionKind::Float {
            min: 0.0,
            max: 1.0,
            default: Some(0.3),
        },
        style: FlagStyle::Value,
    },
    OptionSpec {
        name: "mcts_iterations",
        flag: "-mi",
        kind: OptionKind::Int {
            min: 60,
            max: 2_000,
            default: Some(100),
        },
        style: FlagStyle::Value,
    },
    OptionSpec {
        name: "mcts_depth",
        flag: "-md",
        kind: OptionKind::Int {
            min: 2,
            max: 7,
            default: Some(3),
        },
        style: FlagStyle::Value,
    },
    OptionSpec {
        name: "mcts_nodes",
        flag: "-mn",
        kind: OptionKind::Int {
            min: 10,
            max: 40,
            default: Some(20),
        },
        style: FlagStyle::Value,
    },
    OptionSpec {
        name: "prep_resolution",
        flag: "-pr",
        kind: OptionKind::Int {
            min: 1_000,
            max: 100_000,
            default: Some(10_000),
        },
        style: FlagStyle::Value,
    },
    OptionSpec {
        name: "resolution",
        flag: "-r",
        kind: OptionKind::Int {
            min: 1_000,
            max: 10_000,
            default: Some(2_000),
        },
        style: FlagStyle::Value,
    },
    OptionSpec {
        name: "max_convex_hulls",
        flag: "-c",
        kind: OptionKind::Int {
            min: -1,
            max: 1024,
            default: Some(-1),
        },
        style: FlagStyle::Value,
    },
    OptionSpec {
        name: "decimate",
        flag: "-d",
        kind: OptionKind::Bool {
            default: Some(false),
        },
        style: FlagStyle::Switch,
    },
    OptionSpec {
        name: "max_hull_vertices",
        flag: "-dt",
        kind: OptionKind::Int {
            min: 4,
            max: 1024,
            default: Some(256),
        },
        style: FlagStyle::Value,
    },
    // The merge post-pass is on unless `-nm` is given.
    OptionSpec {
        name: "merge",
        flag: "-nm",
        kind: OptionKind::Bool {
            default: Some(true),
        },
        style: FlagStyle::SwitchWhenFalse,
    },
    OptionSpec {
        name: "pca",
        flag: "--pca",
        kind: OptionKind::Bool {
            default: Some(false),
        },
        style: FlagStyle::Switch,
    },
    OptionSpec {
        name: "no_preprocess",
        flag: "-np",
        kind: OptionKind::Bool {
            default: Some(true),
        },
        style: FlagStyle::Switch,
    },
];

/// Drives the tree-search CoACD solver.
///
/// `main -i <input> -o <output> [options]` writes every hull into the one
/// output file as its own `o` section.
#[derive(Debug, Clone)]
pub struct TreeSearchSolverAdapter {
    binary: PathBuf,
}

impl TreeSearchSolverAdapter {
    /// Creates an adapter for the CoACD executable at `binary`.
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl SolverAdapter for TreeSearchSolverAdapter {
    fn kind(&self) -> SolverKind {
        SolverKind::Coacd
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

    fn arguments(&self, params: &ResolvedParams, input: &Path, output: &OutputLayout) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-i".into(), input.as_os_str().to_os_string()];
        if let OutputLayout::Sectioned(path) = output {
            args.push("-o".into());
            args.push(path.as_os_str().to_os_string());
        }
        args.extend(params.to_args());
        args
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::solver::ParameterSet;

    fn args_for(params: &ParameterSet) -> Vec<String> {
        let adapter = TreeSearchSolverAdapter::new("/opt/coacd/main");
        let resolved = ResolvedParams::resolve("CoACD", adapter.options(), params).unwrap();
        adapter
            .invocation(&resolved, Path::new("/tmp/run"), None)
            .args
            .iter()
            .map(|a| a.to_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn default_command_line() {
        assert_eq!(
            args_for(&ParameterSet::new()),
            [
                "-i", "/tmp/run/src.obj", "-o", "/tmp/run/hulls.obj", "-t", "0.05", "-k", "0.3",
                "-mi", "100", "-md", "3", "-mn", "20", "-pr", "10000", "-r", "2000", "-c", "-1",
                "-dt", "256", "-np",
            ]
        );
    }

    #[test]
    fn switches_follow_flags() {
        let params = ParameterSet::new()
            .with("merge", false)
            .with("pca", true)
            .with("decimate", true)
            .with("no_preprocess", false);
        let args = args_for(&params);
        assert!(args.iter().any(|a| a == "-nm"));
        assert!(args.iter().any(|a| a == "--pca"));
        assert!(args.iter().any(|a| a == "-d"));
        assert!(!args.iter().any(|a| a == "-np"));
    }

    #[test]
    fn mcts_depth_range_is_enforced() {
        let adapter = TreeSearchSolverAdapter::new("/opt/coacd/main");
        let params = ParameterSet::new().with("mcts_depth", 9);
        let err = ResolvedParams::resolve("CoACD", adapter.options(), &params).unwrap_err();
        assert!(matches!(
            err,
            crate::error::ConfigError::OutOfRange {
                option: "mcts_depth",
                ..
            }
        ));
    }
}
