// src/dag/state_manager.rs

//! Per-run state transitions for stages in the scheduler.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::dag::stage_info::{RunState, StageInfo};
use crate::dag::DependencyGraph;
use crate::types::StageName;

/// Manages per-run state transitions for stages.
pub struct StateManager<'a> {
    graph: &'a DependencyGraph,
    stages: &'a mut HashMap<StageName, StageInfo>,
}

impl<'a> StateManager<'a> {
    pub fn new(graph: &'a DependencyGraph, stages: &'a mut HashMap<StageName, StageInfo>) -> Self {
        Self { graph, stages }
    }

    /// Mark every still-pending stage downstream of `failed` as `Skipped`.
    ///
    /// Returns the newly skipped stages (excluding `failed` itself).
    pub fn mark_dependents_skipped(&mut self, failed: &str) -> Vec<StageName> {
        let mut stack: Vec<StageName> = self.graph.dependents_of(failed).to_vec();
        let mut newly_skipped = Vec::new();

        while let Some(name) = stack.pop() {
            if let Some(info) = self.stages.get_mut(&name) {
                match info.run_state {
                    Some(RunState::Pending) => {
                        info.run_state = Some(RunState::Skipped);
                        debug!(stage = %info.name, "skipping stage due to upstream failure");
                        newly_skipped.push(info.name.clone());
                        stack.extend(self.graph.dependents_of(&name).iter().cloned());
                    }
                    Some(RunState::Running) => {
                        // Cannot happen: a running stage's upstreams all succeeded.
                        warn!(stage = %info.name, "running stage downstream of a failure");
                    }
                    _ => {}
                }
            }
        }

        self.sort_topologically(&mut newly_skipped);
        newly_skipped
    }

    /// Mark every pending stage as `Skipped`.
    pub fn skip_all_pending(&mut self) -> Vec<StageName> {
        let mut skipped = Vec::new();
        for info in self.stages.values_mut() {
            if info.run_state == Some(RunState::Pending) {
                info.run_state = Some(RunState::Skipped);
                skipped.push(info.name.clone());
            }
        }
        self.sort_topologically(&mut skipped);
        skipped
    }

    /// Collect up to `limit` pending stages whose upstreams have all
    /// succeeded, mark them `Running`, and return them in topological order.
    pub fn collect_new_ready(&mut self, limit: usize) -> Vec<StageName> {
        if limit == 0 {
            return Vec::new();
        }

        // Decide first, then mutate to avoid borrowing issues.
        let mut candidates: Vec<(usize, StageName)> = self
            .stages
            .values()
            .filter(|info| {
                matches!(info.run_state, Some(RunState::Pending)) && self.deps_satisfied_for(info)
            })
            .map(|info| (info.topo_index, info.name.clone()))
            .collect();
        candidates.sort();
        candidates.truncate(limit);

        let mut ready = Vec::with_capacity(candidates.len());
        for (_, name) in candidates {
            if let Some(info) = self.stages.get_mut(&name) {
                debug!(stage = %info.name, "upstream resolved; marking Running");
                info.run_state = Some(RunState::Running);
                ready.push(name);
            }
        }
        ready
    }

    /// Upstream stages outside the run count as satisfied; inside the run
    /// they must have succeeded.
    pub fn deps_satisfied_for(&self, info: &StageInfo) -> bool {
        info.deps.iter().all(|dep| match self.stages.get(dep) {
            Some(dep) => match dep.run_state {
                None => true,
                Some(state) => state.is_success(),
            },
            None => {
                warn!(stage = %info.name, dep = %dep, "dependency missing from stages map");
                false
            }
        })
    }

    fn sort_topologically(&self, names: &mut [StageName]) {
        names.sort_by_key(|name| self.stages.get(name).map_or(usize::MAX, |info| info.topo_index));
    }
}
