use std::fmt;

use tracing::{info, warn};
use uuid::Uuid;

use crate::mesh::ConvexHull;

/// Stage of a decomposition run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Serializing,
    Running,
    Parsing,
    Materializing,
    Done,
    Failed(String),
    Cancelled,
}

impl PipelineState {
    /// Returns `true` for `Done`, `Failed` and `Cancelled`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed(_) | Self::Cancelled)
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Serializing => 1,
            Self::Running => 2,
            Self::Parsing => 3,
            Self::Materializing => 4,
            Self::Done | Self::Failed(_) | Self::Cancelled => 5,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Serializing => f.write_str("serializing"),
            Self::Running => f.write_str("running"),
            Self::Parsing => f.write_str("parsing"),
            Self::Materializing => f.write_str("materializing"),
            Self::Done => f.write_str("done"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Terminal outcome of a run as seen by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum RunResult {
    Success(Vec<ConvexHull>),
    SolverFailed {
        exit_code: Option<i32>,
        diagnostics: String,
    },
    ParseFailed(String),
    Cancelled,
}

/// Forward-only state tracker for one run.
///
/// Stages can be skipped but never revisited, and a terminal state is final.
#[derive(Debug, Clone)]
pub struct StateMachine {
    run_id: Uuid,
    state: PipelineState,
}

impl StateMachine {
    /// Creates a tracker in the `Idle` state.
    #[must_use]
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            state: PipelineState::Idle,
        }
    }

    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    #[must_use]
    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Moves to `next` if that is a forward step, returning whether it did.
    pub fn advance(&mut self, next: PipelineState) -> bool {
        if self.state.is_terminal() || next.rank() <= self.state.rank() {
            warn!(run = %self.run_id, from = %self.state, to = %next, "rejected state transition");
            return false;
        }
        info!(run = %self.run_id, from = %self.state, to = %next, "state transition");
        self.state = next;
        true
    }

    /// Moves to `Failed(reason)` unless already terminal.
    pub fn fail(&mut self, reason: impl Into<String>) -> bool {
        self.advance(PipelineState::Failed(reason.into()))
    }

    /// Moves to `Cancelled` unless already terminal.
    pub fn cancel(&mut self) -> bool {
        self.advance(PipelineState::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_moves_forward() {
        let mut machine = StateMachine::new(Uuid::new_v4());
        for next in [
            PipelineState::Serializing,
            PipelineState::Running,
            PipelineState::Parsing,
            PipelineState::Materializing,
            PipelineState::Done,
        ] {
            assert!(machine.advance(next));
        }
        assert_eq!(machine.state(), &PipelineState::Done);
    }

    #[test]
    fn backwards_and_repeated_steps_are_rejected() {
        let mut machine = StateMachine::new(Uuid::new_v4());
        assert!(machine.advance(PipelineState::Running));
        assert!(!machine.advance(PipelineState::Serializing));
        assert!(!machine.advance(PipelineState::Running));
        assert_eq!(machine.state(), &PipelineState::Running);
    }

    #[test]
    fn terminal_states_are_final() {
        let mut machine = StateMachine::new(Uuid::new_v4());
        assert!(machine.advance(PipelineState::Serializing));
        assert!(machine.cancel());
        assert!(!machine.fail("late"));
        assert!(!machine.advance(PipelineState::Done));
        assert_eq!(machine.state(), &PipelineState::Cancelled);
    }

    #[test]
    fn failure_is_reachable_from_any_stage() {
        let mut machine = StateMachine::new(Uuid::new_v4());
        assert!(machine.fail("bad option"));
        assert_eq!(machine.state().to_string(), "failed: bad option");
    }
}
