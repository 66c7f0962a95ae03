// src/exec/command.rs

//! Shell command operations.

use std::process::Stdio;

use anyhow::Context;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::model::OperationConfig;
use crate::errors::{OperationError, OpgraphError, Result};
use crate::operation::pool::worker_pool;
use crate::operation::{RunContext, Work};

/// [`Work`] that runs one shell command to completion.
///
/// The child process is driven on the shared worker pool runtime, whatever
/// the dispatch mode of the operation. Cancelling the run kills the process.
#[derive(Debug, Clone)]
pub struct CommandWork {
    cmd: String,
    progress_pattern: Option<Regex>,
}

impl CommandWork {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            progress_pattern: None,
        }
    }

    /// Report progress whenever a stdout line matches `pattern`. The first
    /// capture group is read as a percentage (`0..=100`).
    pub fn with_progress_pattern(mut self, pattern: Regex) -> Self {
        self.progress_pattern = Some(pattern);
        self
    }

    pub fn from_config(name: &str, cfg: &OperationConfig) -> Result<Self> {
        let mut work = Self::new(cfg.cmd.clone());
        if let Some(pattern) = &cfg.progress_pattern {
            let re = Regex::new(pattern).map_err(|e| {
                OpgraphError::ConfigError(format!(
                    "operation '{}' has an invalid `progress_pattern`: {}",
                    name, e
                ))
            })?;
            work = work.with_progress_pattern(re);
        }
        Ok(work)
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }
}

impl Work for CommandWork {
    fn execute(&self, ctx: &RunContext) -> std::result::Result<(), OperationError> {
        let pool = worker_pool()?;
        pool.block_on(run_command(&self.cmd, self.progress_pattern.clone(), ctx))
    }
}

async fn run_command(
    cmd_line: &str,
    progress_pattern: Option<Regex>,
    ctx: &RunContext,
) -> std::result::Result<(), OperationError> {
    info!(operation = %ctx.name(), cmd = %cmd_line, "starting command");

    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd_line);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd_line);
        c
    };

    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning process for operation '{}'", ctx.name()))?;

    let stdout_task = child
        .stdout
        .take()
        .map(|stdout| spawn_stdout_monitor(stdout, progress_pattern, ctx.clone()));

    // Always consume stderr so buffers don't fill; log at debug.
    if let Some(stderr) = child.stderr.take() {
        let name = ctx.name().to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(operation = %name, "stderr: {}", line);
            }
        });
    }

    tokio::select! {
        status_res = child.wait() => {
            let status = status_res
                .with_context(|| format!("waiting for process of operation '{}'", ctx.name()))?;

            // Let the monitor see the last lines before judging the run.
            if let Some(task) = stdout_task {
                let _ = task.await;
            }

            let code = status.code().unwrap_or(-1);
            info!(
                operation = %ctx.name(),
                exit_code = code,
                success = status.success(),
                "command exited"
            );

            if status.success() {
                Ok(())
            } else {
                Err(OperationError::failed(format!("command exited with code {code}")))
            }
        }

        _ = ctx.token().cancelled() => {
            info!(operation = %ctx.name(), "cancellation requested; killing process");
            if let Some(task) = &stdout_task {
                task.abort();
            }
            if let Err(e) = child.kill().await {
                warn!(
                    operation = %ctx.name(),
                    error = %e,
                    "failed to kill child process on cancellation"
                );
            }
            Err(OperationError::Cancelled)
        }
    }
}

fn spawn_stdout_monitor(
    stdout: ChildStdout,
    progress_pattern: Option<Regex>,
    ctx: RunContext,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(operation = %ctx.name(), "stdout: {}", line);

            if let Some(percent) = progress_pattern.as_ref().and_then(|re| parse_percent(re, &line)) {
                ctx.set_progress(percent / 100.0);
            }
        }
    })
}

fn parse_percent(re: &Regex, line: &str) -> Option<f64> {
    let caps = re.captures(line)?;
    caps.get(1)?.as_str().trim().parse::<f64>().ok()
}
