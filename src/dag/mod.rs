// src/dag/mod.rs

//! Stage graph and per-run scheduling.
//!
//! - [`stage`] holds the execution-side `StageSpec`.
//! - [`graph`] builds the dependency graph from declared paths.
//! - [`scheduler`] is the per-run state machine deciding which stages are
//!   ready and which get skipped after a failure.
//! - [`stage_info`] and [`state_manager`] hold per-run state and its
//!   transitions.
//! - [`pipeline`] ties a loaded declaration to its specs and graph.

pub mod graph;
pub mod pipeline;
pub mod scheduler;
pub mod scheduler_step;
pub mod stage;
pub mod stage_info;
pub mod state_manager;

pub use graph::DependencyGraph;
pub use pipeline::Pipeline;
pub use scheduler::Scheduler;
pub use scheduler_step::SchedulerStep;
pub use stage::{DepSpec, OutSpec, StageSpec};
pub use stage_info::{Resolution, StageRunState};
