// src/dag/stage_info.rs

//! Per-run stage state.

use crate::types::StageName;

/// Per-run state of a stage (internal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Planned for this run, waiting on upstream stages.
    Pending,
    /// Handed to the driver: being checked or executing.
    Running,
    /// Checked and found up to date.
    UpToDate,
    /// Executed successfully and committed to the lock.
    Executed,
    /// Failed in this run.
    Failed,
    /// Not attempted because an upstream stage failed or the run halted.
    Skipped,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RunState::Pending | RunState::Running)
    }

    /// Downstream stages may proceed past this one.
    pub fn is_success(self) -> bool {
        matches!(self, RunState::UpToDate | RunState::Executed)
    }
}

/// Public, read-only view of a stage's per-run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageRunState {
    /// The stage is not part of this run.
    NotInRun,
    Pending,
    Running,
    UpToDate,
    Executed,
    Failed,
    Skipped,
}

impl From<Option<RunState>> for StageRunState {
    fn from(state: Option<RunState>) -> Self {
        match state {
            None => StageRunState::NotInRun,
            Some(RunState::Pending) => StageRunState::Pending,
            Some(RunState::Running) => StageRunState::Running,
            Some(RunState::UpToDate) => StageRunState::UpToDate,
            Some(RunState::Executed) => StageRunState::Executed,
            Some(RunState::Failed) => StageRunState::Failed,
            Some(RunState::Skipped) => StageRunState::Skipped,
        }
    }
}

/// Static stage information plus per-run state.
#[derive(Debug, Clone)]
pub struct StageInfo {
    pub name: StageName,
    /// Direct upstream stages.
    pub deps: Vec<StageName>,
    /// Position in the graph's topological order; keeps dispatch stable.
    pub topo_index: usize,
    /// Per-run state (None if not participating in the current run).
    pub run_state: Option<RunState>,
}

/// How the driver resolved a stage it took from the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    UpToDate,
    Executed,
    Failed,
}
