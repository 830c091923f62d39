use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::io::{ParseHulls, WriteObj};
use crate::mesh::SourceMesh;
use crate::process::{CancelToken, SupervisedRun, Supervisor};
use crate::scene::{HullAppearance, Materialize, ObjectId, Scene, SceneArtifact};
use crate::solver::{ParameterSet, SolverAdapter};

use super::run_dir::RunDir;
use super::state::{PipelineState, RunResult, StateMachine};

/// Per-run settings that are not solver parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    /// Name of the collection that receives every hull.
    pub collection_name: String,
    pub appearance: HullAppearance,
    /// Upper bound on solver wall time; `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Parent of the per-run directory; `None` uses the OS temp directory.
    pub temp_root: Option<PathBuf>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            collection_name: "convex hulls".to_string(),
            appearance: HullAppearance::default(),
            timeout: None,
            temp_root: None,
        }
    }
}

/// Everything a finished run hands back to the caller.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    /// Terminal pipeline state.
    pub state: PipelineState,
    pub result: RunResult,
    /// One artifact per hull on success, empty otherwise.
    pub artifacts: Vec<SceneArtifact>,
    pub elapsed: Duration,
}

/// Result of the scene-independent part of a run.
#[derive(Debug)]
pub struct SolveOutcome {
    pub(crate) machine: StateMachine,
    pub(crate) result: Result<RunResult>,
    pub(crate) started: Instant,
}

/// Serialize, solve and parse, without touching the scene.
///
/// Owns a snapshot of the source mesh so it can run on a worker thread.
#[derive(Debug)]
pub struct SolveJob {
    mesh: SourceMesh,
    adapter: Arc<dyn SolverAdapter>,
    params: ParameterSet,
    timeout: Option<Duration>,
    temp_root: PathBuf,
}

impl SolveJob {
    /// Creates a new `SolveJob`.
    #[must_use]
    pub fn new(mesh: SourceMesh, adapter: Arc<dyn SolverAdapter>, params: ParameterSet, options: &RunOptions) -> Self {
        Self {
            mesh,
            adapter,
            params,
            timeout: options.timeout,
            temp_root: options.temp_root.clone().unwrap_or_else(std::env::temp_dir),
        }
    }

    /// Runs the job to a result. The run directory is gone when this returns.
    pub fn run(&self, run_id: Uuid, cancel: &CancelToken) -> SolveOutcome {
        let started = Instant::now();
        let mut machine = StateMachine::new(run_id);
        info!(run = %run_id, solver = %self.adapter.kind(), "decomposition started");
        let result = self.solve(&mut machine, cancel);
        if let Err(e) = &result {
            machine.fail(e.to_string());
        }
        SolveOutcome {
            machine,
            result,
            started,
        }
    }

    fn solve(&self, machine: &mut StateMachine, cancel: &CancelToken) -> Result<RunResult> {
        // Bad options and missing binaries surface before anything is written.
        let params = self.adapter.check(&self.params)?;
        if cancelled(machine, cancel) {
            return Ok(RunResult::Cancelled);
        }

        machine.advance(PipelineState::Serializing);
        let run_dir = RunDir::create(&self.temp_root, machine.run_id())?;
        let invocation = self.adapter.invocation(&params, run_dir.path(), self.timeout);
        WriteObj::new(&self.mesh, &invocation.input).execute()?;
        if cancelled(machine, cancel) {
            return Ok(RunResult::Cancelled);
        }

        machine.advance(PipelineState::Running);
        let outputs = match Supervisor::new(&invocation).run(cancel)? {
            SupervisedRun::Completed { outputs, .. } => outputs,
            SupervisedRun::Failed {
                exit_code,
                diagnostics,
                ..
            } => {
                machine.fail(match exit_code {
                    Some(code) => format!("solver exited with status {code}"),
                    None => "solver did not exit normally".to_string(),
                });
                return Ok(RunResult::SolverFailed {
                    exit_code,
                    diagnostics,
                });
            }
            SupervisedRun::Cancelled { .. } => {
                machine.cancel();
                return Ok(RunResult::Cancelled);
            }
        };
        if cancelled(machine, cancel) {
            return Ok(RunResult::Cancelled);
        }

        machine.advance(PipelineState::Parsing);
        let hulls = match ParseHulls::new(&outputs).execute() {
            Ok(hulls) => hulls,
            Err(e) => {
                let reason = e.to_string();
                machine.fail(reason.clone());
                return Ok(RunResult::ParseFailed(reason));
            }
        };
        if cancelled(machine, cancel) {
            return Ok(RunResult::Cancelled);
        }
        Ok(RunResult::Success(hulls))
    }
}

fn cancelled(machine: &mut StateMachine, cancel: &CancelToken) -> bool {
    if cancel.is_cancelled() {
        machine.cancel();
        return true;
    }
    false
}

/// Decomposes one scene object into convex hulls parented to it.
///
/// This is the single entry point for a run: it drives serialization, the
/// solver, parsing and scene materialization, and always cleans up its
/// temporary files.
#[derive(Debug, Clone)]
pub struct Decompose {
    source: ObjectId,
    adapter: Arc<dyn SolverAdapter>,
    params: ParameterSet,
    options: RunOptions,
}

impl Decompose {
    /// Creates a new `Decompose` operation.
    #[must_use]
    pub fn new(source: ObjectId, adapter: Arc<dyn SolverAdapter>, params: ParameterSet, options: RunOptions) -> Self {
        Self {
            source,
            adapter,
            params,
            options,
        }
    }

    #[must_use]
    pub fn source(&self) -> ObjectId {
        self.source
    }

    /// Runs the whole pipeline on the calling thread.
    ///
    /// Blocks for the full solver run. Solver failures, parse failures and
    /// cancellation come back as [`RunResult`] variants.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid configuration, an unreadable source, I/O
    /// failures and scene failures. Temporary files are removed and no hull
    /// objects remain in either case.
    pub fn execute<S: Scene + ?Sized>(&self, scene: &mut S, cancel: &CancelToken) -> Result<RunReport> {
        let outcome = self.prepare(scene)?.run(Uuid::new_v4(), cancel);
        self.finish(scene, outcome, cancel.is_cancelled())
    }

    /// Snapshots the source mesh into a job that can run off the host thread.
    pub(crate) fn prepare<S: Scene + ?Sized>(&self, scene: &S) -> Result<SolveJob> {
        let mesh = scene.world_mesh(self.source)?;
        Ok(SolveJob::new(
            mesh,
            Arc::clone(&self.adapter),
            self.params.clone(),
            &self.options,
        ))
    }

    /// Materializes a successful outcome and builds the report.
    pub(crate) fn finish<S: Scene + ?Sized>(
        &self,
        scene: &mut S,
        outcome: SolveOutcome,
        cancelled: bool,
    ) -> Result<RunReport> {
        let SolveOutcome {
            mut machine,
            result,
            started,
        } = outcome;

        let result = match result? {
            RunResult::Success(_) if cancelled => {
                machine.cancel();
                RunResult::Cancelled
            }
            RunResult::Success(hulls) => {
                machine.advance(PipelineState::Materializing);
                let artifacts = match Materialize::new(
                    self.source,
                    &hulls,
                    &self.options.collection_name,
                    self.options.appearance,
                )
                .execute(scene)
                {
                    Ok(artifacts) => artifacts,
                    Err(e) => {
                        machine.fail(e.to_string());
                        return Err(e.into());
                    }
                };
                machine.advance(PipelineState::Done);
                return Ok(report(machine, RunResult::Success(hulls), artifacts, started));
            }
            other => other,
        };
        if let RunResult::SolverFailed { diagnostics, .. } = &result {
            warn!(run = %machine.run_id(), %diagnostics, "solver failed");
        }
        Ok(report(machine, result, Vec::new(), started))
    }
}

fn report(machine: StateMachine, result: RunResult, artifacts: Vec<SceneArtifact>, started: Instant) -> RunReport {
    let elapsed = started.elapsed();
    info!(run = %machine.run_id(), state = %machine.state(), hulls = artifacts.len(), ?elapsed, "decomposition finished");
    RunReport {
        run_id: machine.run_id(),
        state: machine.state().clone(),
        result,
        artifacts,
        elapsed,
    }
}
