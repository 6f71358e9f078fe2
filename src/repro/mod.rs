// src/repro/mod.rs

//! Reproduce: diff current hashes against the lock, run what is stale,
//! commit what succeeded.
//!
//! - [`status`] decides whether a single stage is stale and why.
//! - [`reproducer`] drives a whole run over the stage graph.

pub mod reproducer;
pub mod status;

pub use reproducer::{ReproReport, Reproducer};
pub use status::{stale_reasons, Observation, StageStatus, StaleReason};
