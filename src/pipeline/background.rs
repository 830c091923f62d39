use std::cell::Cell;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{DecompError, Result};
use crate::process::{cancel_channel, CancelHandle};
use crate::scene::Scene;

use super::orchestrator::{Decompose, RunReport, SolveOutcome};

impl Decompose {
    /// Starts the run on a worker thread.
    ///
    /// The source mesh is read here, on the calling thread. Serialization,
    /// the solver and parsing happen on the worker; the hulls come back over
    /// a completion channel and are placed into the scene by
    /// [`BackgroundRun::finish`] or [`BackgroundRun::try_finish`] on the
    /// thread that owns the scene.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read or the worker thread
    /// cannot be started.
    pub fn spawn<S: Scene + ?Sized>(&self, scene: &S) -> Result<BackgroundRun> {
        let job = self.prepare(scene)?;
        let run_id = Uuid::new_v4();
        let (cancel, token) = cancel_channel();
        let (done_tx, done_rx) = mpsc::channel::<SolveOutcome>();

        let worker = thread::Builder::new()
            .name(format!("convex-decomp-{run_id}"))
            .spawn(move || {
                let outcome = job.run(run_id, &token);
                // The receiver is gone only if the host dropped the run.
                if done_tx.send(outcome).is_err() {
                    debug!(run = %run_id, "run abandoned before completion");
                }
            })
            .map_err(DecompError::WorkerSpawn)?;

        Ok(BackgroundRun {
            run_id,
            request: self.clone(),
            cancel,
            cancel_requested: Cell::new(false),
            done: done_rx,
            worker: Some(worker),
        })
    }
}

/// A decomposition running on a worker thread.
///
/// Dropping it cancels the run and waits for the worker, so the solver
/// process and the run directory never outlive it.
#[derive(Debug)]
pub struct BackgroundRun {
    run_id: Uuid,
    request: Decompose,
    cancel: CancelHandle,
    cancel_requested: Cell<bool>,
    done: Receiver<SolveOutcome>,
    worker: Option<JoinHandle<()>>,
}

impl BackgroundRun {
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// `true` once the worker has handed back its outcome. Nothing reaches
    /// the scene until [`finish`](Self::finish) or
    /// [`try_finish`](Self::try_finish).
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.worker.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Requests cancellation. A cancelled run never materializes hulls, even
    /// if the solver had already finished.
    pub fn cancel(&self) {
        self.cancel_requested.set(true);
        self.cancel.cancel();
    }

    /// Blocks until the worker is done, then materializes on this thread.
    ///
    /// # Errors
    ///
    /// Returns the run's error, or [`DecompError::WorkerLost`] if the worker
    /// died without reporting.
    pub fn finish<S: Scene + ?Sized>(mut self, scene: &mut S) -> Result<RunReport> {
        let outcome = self.done.recv().map_err(|_| DecompError::WorkerLost);
        self.join();
        self.request
            .finish(scene, outcome?, self.cancel_requested.get())
    }

    /// Non-blocking variant of [`finish`](Self::finish) for host event loops.
    ///
    /// Returns `None` while the worker is still busy.
    ///
    /// # Errors
    ///
    /// Same as [`finish`](Self::finish).
    pub fn try_finish<S: Scene + ?Sized>(&mut self, scene: &mut S) -> Option<Result<RunReport>> {
        let outcome = match self.done.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => {
                self.join();
                return Some(Err(DecompError::WorkerLost));
            }
        };
        self.join();
        Some(self.request.finish(scene, outcome, self.cancel_requested.get()))
    }

    fn join(&mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!(run = %self.run_id, "decomposition worker panicked");
            }
        }
    }
}

impl Drop for BackgroundRun {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.cancel.cancel();
            self.join();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::math::Point3;
    use crate::pipeline::RunOptions;
    use crate::scene::SceneStore;
    use crate::solver::{ParameterSet, SolverKind, SolverPaths};

    #[test]
    fn configuration_errors_come_back_through_finish() {
        let mut scene = SceneStore::new();
        let tri = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let source = scene.create_mesh_object("Crate", &tri, &[[0, 1, 2]]).unwrap();
        let adapter = SolverKind::Coacd.adapter(&SolverPaths::default());

        let run = Decompose::new(source, adapter, ParameterSet::new(), RunOptions::default())
            .spawn(&scene)
            .unwrap();
        let err = run.finish(&mut scene).unwrap_err();

        assert!(matches!(err, DecompError::Config(ConfigError::BinaryNotFound { .. })));
        assert_eq!(scene.object_count(), 1);
    }
}
