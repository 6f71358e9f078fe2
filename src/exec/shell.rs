// src/exec/shell.rs

//! Runs stage commands through the platform shell.

use std::process::Stdio;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::Result;
use crate::exec::backend::{ExecutorBackend, StageFuture, StageJob};
use crate::types::{StageName, StageOutcome};

/// Production backend: `sh -c <cmd>` (or `cmd /C` on Windows) in the
/// pipeline root.
///
/// Children are spawned with `kill_on_drop`, so dropping the reproducer
/// future (e.g. on Ctrl-C) stops them.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellExecutor;

impl ShellExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl ExecutorBackend for ShellExecutor {
    fn run_stage(&self, job: StageJob) -> StageFuture {
        Box::pin(run_shell(job))
    }
}

async fn run_shell(job: StageJob) -> Result<StageOutcome> {
    info!(stage = %job.stage, cmd = %job.cmd, "starting stage process");

    // Build a shell command appropriate for the platform.
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(&job.cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(&job.cmd);
        c
    };

    cmd.current_dir(&job.workdir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning process for stage '{}'", job.stage))?;

    // Always consume both pipes so buffers don't fill; log at debug.
    if let Some(stdout) = child.stdout.take() {
        forward_lines(job.stage.clone(), "stdout", stdout);
    }
    if let Some(stderr) = child.stderr.take() {
        forward_lines(job.stage.clone(), "stderr", stderr);
    }

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for process of stage '{}'", job.stage))?;

    let code = status.code().unwrap_or(-1);
    info!(
        stage = %job.stage,
        exit_code = code,
        success = status.success(),
        "stage process exited"
    );

    Ok(if status.success() {
        StageOutcome::Success
    } else {
        StageOutcome::Failed(code)
    })
}

fn forward_lines<R>(stage: StageName, stream: &'static str, reader: R)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(stage = %stage, stream, "{}", line);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[tokio::test]
    async fn reports_exit_code_of_failing_command() {
        let dir = tempfile::tempdir().unwrap();
        let job = StageJob {
            stage: "fail".into(),
            cmd: "exit 3".into(),
            workdir: dir.path().to_path_buf(),
        };
        let outcome = ShellExecutor::new().run_stage(job).await.unwrap();
        assert_eq!(outcome, StageOutcome::Failed(3));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_in_the_given_workdir() {
        let dir = tempfile::tempdir().unwrap();
        let job = StageJob {
            stage: "touch".into(),
            cmd: "echo hi > out.txt".into(),
            workdir: dir.path().to_path_buf(),
        };
        let outcome = ShellExecutor::new().run_stage(job).await.unwrap();
        assert_eq!(outcome, StageOutcome::Success);
        assert!(dir.path().join("out.txt").exists());
    }
}
