// src/dag/scheduler.rs

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::dag::graph::DependencyGraph;
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::stage_info::{Resolution, RunState, StageInfo, StageRunState};
use crate::dag::state_manager::StateManager;
use crate::types::StageName;

/// Scheduler holds the immutable graph plus mutable per-run state.
///
/// It is responsible for:
/// - remembering which stages are part of the current run
/// - deciding when a stage is ready (all in-run upstreams succeeded)
/// - recording how each stage was resolved
/// - skipping downstream stages when a stage fails
///
/// It performs no IO; the reproducer decides staleness and runs commands.
#[derive(Debug)]
pub struct Scheduler {
    graph: DependencyGraph,
    stages: HashMap<StageName, StageInfo>,
}

impl Scheduler {
    pub fn new(graph: &DependencyGraph) -> Self {
        let stages = graph
            .topo_order()
            .iter()
            .enumerate()
            .map(|(topo_index, name)| {
                let info = StageInfo {
                    name: name.clone(),
                    deps: graph.dependencies_of(name).to_vec(),
                    topo_index,
                    run_state: None,
                };
                (name.clone(), info)
            })
            .collect();

        Self {
            graph: graph.clone(),
            stages,
        }
    }

    /// Start a run over `plan`, resetting all per-run state.
    pub fn start_run<S: AsRef<str>>(&mut self, plan: &[S]) {
        for info in self.stages.values_mut() {
            info.run_state = None;
        }
        for name in plan {
            match self.stages.get_mut(name.as_ref()) {
                Some(info) => info.run_state = Some(RunState::Pending),
                None => warn!(stage = %name.as_ref(), "planned stage unknown to scheduler; ignoring"),
            }
        }
        debug!(stages = plan.len(), "scheduler: starting run");
    }

    /// Take up to `limit` ready stages, marking them `Running`.
    pub fn collect_ready(&mut self, limit: usize) -> Vec<StageName> {
        let mut manager = StateManager::new(&self.graph, &mut self.stages);
        manager.collect_new_ready(limit)
    }

    /// Record how a running stage was resolved.
    pub fn complete(&mut self, stage: &str, resolution: Resolution) -> SchedulerStep {
        let mut newly_skipped = Vec::new();

        match self.stages.get_mut(stage) {
            Some(info) => {
                if info.run_state != Some(RunState::Running) {
                    warn!(stage = %stage, state = ?info.run_state, "completion for stage that is not running");
                }
                match resolution {
                    Resolution::UpToDate => info.run_state = Some(RunState::UpToDate),
                    Resolution::Executed => info.run_state = Some(RunState::Executed),
                    Resolution::Failed => {
                        info.run_state = Some(RunState::Failed);
                        let mut manager = StateManager::new(&self.graph, &mut self.stages);
                        newly_skipped = manager.mark_dependents_skipped(stage);
                    }
                }
            }
            None => warn!(stage = %stage, "completion for unknown stage; ignoring"),
        }

        SchedulerStep {
            newly_skipped,
            run_finished: self.is_finished(),
        }
    }

    /// Stop the run: every pending stage becomes `Skipped`. Running stages
    /// still complete normally.
    pub fn halt(&mut self) -> SchedulerStep {
        let mut manager = StateManager::new(&self.graph, &mut self.stages);
        let newly_skipped = manager.skip_all_pending();
        if !newly_skipped.is_empty() {
            info!(skipped = ?newly_skipped, "scheduler: halting run");
        }
        SchedulerStep {
            newly_skipped,
            run_finished: self.is_finished(),
        }
    }

    /// Whether the dependencies of `stage` are satisfied for the current run.
    ///
    /// Returns `None` if the stage is unknown.
    pub fn deps_satisfied(&self, stage: &str) -> Option<bool> {
        let info = self.stages.get(stage)?;
        Some(
            info.deps
                .iter()
                .all(|dep| match self.stages.get(dep).and_then(|d| d.run_state) {
                    None => true,
                    Some(state) => state.is_success(),
                }),
        )
    }

    /// All stages of the run are terminal.
    pub fn is_finished(&self) -> bool {
        self.stages
            .values()
            .all(|info| info.run_state.is_none_or(RunState::is_terminal))
    }

    /// Read-only view of the given stage's run state.
    pub fn run_state_of(&self, stage: &str) -> Option<StageRunState> {
        let info = self.stages.get(stage)?;
        Some(info.run_state.into())
    }

    /// Stages currently in `state`, in topological order.
    pub fn stages_in(&self, state: StageRunState) -> Vec<StageName> {
        self.graph
            .topo_order()
            .iter()
            .filter(|name| self.run_state_of(name) == Some(state))
            .cloned()
            .collect()
    }
}
