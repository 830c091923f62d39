//! The run orchestrator: drives serialize, solve, parse and materialize.

mod background;
mod orchestrator;
mod run_dir;
mod state;

pub use background::BackgroundRun;
pub use orchestrator::{Decompose, RunOptions, RunReport, SolveJob, SolveOutcome};
pub use run_dir::{RunDir, RUN_DIR_PREFIX};
pub use state::{PipelineState, RunResult, StateMachine};
