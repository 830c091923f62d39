use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for a decomposition run.
#[derive(Debug, Error)]
pub enum DecompError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Mesh(#[from] MeshError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Scene(#[from] SceneError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("failed to create run directory {}: {source}", .path.display())]
    RunDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start decomposition worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    #[error("background decomposition worker terminated without reporting a result")]
    WorkerLost,
}

/// Errors raised while validating solver parameters and configuration.
///
/// These are always reported before any file is written or process spawned.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown option `{option}` for solver {solver}")]
    UnknownOption { solver: &'static str, option: String },

    #[error("missing required option `{option}` for solver {solver}")]
    MissingOption {
        solver: &'static str,
        option: &'static str,
    },

    #[error("option `{option}` expects {expected}")]
    TypeMismatch {
        option: &'static str,
        expected: &'static str,
    },

    #[error("option `{option}` = {value} is out of range [{min}, {max}]")]
    OutOfRange {
        option: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("option `{option}` = `{value}` is not one of {choices:?}")]
    InvalidChoice {
        option: &'static str,
        value: String,
        choices: &'static [&'static str],
    },

    #[error("{solver} binary not found or not executable: `{}`", .path.display())]
    BinaryNotFound { solver: &'static str, path: PathBuf },

    #[error("unknown solver `{0}`")]
    UnknownSolver(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("cannot read configuration {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors related to the source mesh and its serialization.
#[derive(Debug, Error)]
pub enum MeshError {
    #[error("mesh has no faces")]
    EmptyMesh,

    #[error("face {face} references vertex {index}, but the mesh has {count} vertices")]
    IndexOutOfRange {
        face: usize,
        index: u32,
        count: usize,
    },

    #[error("face {0} has fewer than three vertices")]
    DegenerateFace(usize),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid OBJ data in {}: {reason}", .path.display())]
    Obj { path: PathBuf, reason: String },
}

/// A structurally invalid solver output.
///
/// Carries the offending file and, when known, the 1-based line number.
#[derive(Debug, Error)]
#[error("{}{}: {reason}", .path.display(), line_suffix(.line))]
pub struct ParseError {
    pub path: PathBuf,
    pub line: Option<usize>,
    pub reason: String,
}

impl ParseError {
    pub(crate) fn new(path: impl Into<PathBuf>, line: Option<usize>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            line,
            reason: reason.into(),
        }
    }
}

fn line_suffix(line: &Option<usize>) -> String {
    line.map(|l| format!(":{l}")).unwrap_or_default()
}

/// Errors reported by the host scene.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("object not found: {0}")]
    ObjectNotFound(String),

    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    #[error("an object named `{0}` already exists")]
    NameCollision(String),

    #[error("a collection named `{0}` already exists")]
    CollectionExists(String),

    #[error("object `{0}` has no mesh data")]
    NoMesh(String),

    #[error("cannot parent `{child}` to `{parent}`: would create a cycle")]
    ParentCycle { child: String, parent: String },

    #[error("export failed: {0}")]
    Export(String),
}

/// Errors raised while supervising a solver process.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("cannot open solver log {}: {source}", .path.display())]
    Log {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to wait on solver process: {0}")]
    Wait(#[source] std::io::Error),
}

/// Convenience type alias for results using [`DecompError`].
pub type Result<T> = std::result::Result<T, DecompError>;
