// src/dag/scheduler_step.rs

//! Result type for scheduler steps.

use crate::types::StageName;

/// What a single scheduler transition changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStep {
    /// Stages marked `Skipped` by this step.
    pub newly_skipped: Vec<StageName>,
    /// Every stage of the run is now terminal.
    pub run_finished: bool,
}
