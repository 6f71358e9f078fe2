// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The reproducer talks to an `ExecutorBackend` instead of spawning
//! processes itself. Production uses [`ShellExecutor`]; tests can provide a
//! backend that records which stages ran and writes their outputs directly.
//!
//! [`ShellExecutor`]: super::shell::ShellExecutor

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use crate::errors::Result;
use crate::types::{StageName, StageOutcome};

/// One stage command handed to a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageJob {
    pub stage: StageName,
    pub cmd: String,
    /// Directory the command runs in (the pipeline root).
    pub workdir: PathBuf,
}

/// Future returned by [`ExecutorBackend::run_stage`].
pub type StageFuture = Pin<Box<dyn Future<Output = Result<StageOutcome>> + Send + 'static>>;

/// Trait abstracting how stage commands are executed.
///
/// The returned future must not borrow the backend, so the reproducer can
/// drive several stages at once on a `JoinSet`.
pub trait ExecutorBackend: Send + Sync {
    /// Run the command of `job` to completion.
    ///
    /// A command that ran and exited non-zero is `Ok(StageOutcome::Failed)`;
    /// `Err` is reserved for failures to run it at all.
    fn run_stage(&self, job: StageJob) -> StageFuture;
}
