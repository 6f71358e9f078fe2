use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use reprodag::errors::ReprodagError;
use reprodag::exec::{ExecutorBackend, StageFuture, StageJob};
use reprodag::types::StageOutcome;

/// What a fake stage does to the pipeline root when it "runs".
pub type StageAction = Arc<dyn Fn(&Path) -> std::io::Result<()> + Send + Sync>;

/// A fake executor that:
/// - records which stages were "run", in order
/// - performs a configured action (usually writing outputs) instead of a
///   shell command
/// - reports a configured exit code for stages set up to fail.
///
/// Clones share the record, so a test can keep one and hand the other to
/// the reproducer.
#[derive(Clone, Default)]
pub struct FakeExecutor {
    executed: Arc<Mutex<Vec<String>>>,
    actions: HashMap<String, StageAction>,
    failures: HashMap<String, i32>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_action<F>(mut self, stage: &str, action: F) -> Self
    where
        F: Fn(&Path) -> std::io::Result<()> + Send + Sync + 'static,
    {
        self.actions.insert(stage.to_string(), Arc::new(action));
        self
    }

    /// Make `stage` exit with `code` without running its action.
    pub fn failing(mut self, stage: &str, code: i32) -> Self {
        self.failures.insert(stage.to_string(), code);
        self
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.executed.lock().unwrap().clear();
    }
}

impl ExecutorBackend for FakeExecutor {
    fn run_stage(&self, job: StageJob) -> StageFuture {
        let executed = Arc::clone(&self.executed);
        let action = self.actions.get(&job.stage).cloned();
        let failure = self.failures.get(&job.stage).copied();

        Box::pin(async move {
            executed.lock().unwrap().push(job.stage.clone());

            if let Some(code) = failure {
                return Ok(StageOutcome::Failed(code));
            }
            if let Some(action) = action {
                action(&job.workdir).map_err(ReprodagError::from)?;
            }
            Ok(StageOutcome::Success)
        })
    }
}
