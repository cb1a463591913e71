//! Subprocess-based task executor.
//!
//! Stateless and safe to invoke from many concurrent workers — everything it
//! needs travels with the call.

use crate::job::Task;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

/// Outcome of running a task to completion.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

#[derive(Debug, Clone, Copy)]
pub struct TaskExecutor {
    timeout: Duration,
}

impl TaskExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub async fn execute(&self, task: &Task) -> ExecutionOutcome {
        match task {
            Task::ExecuteCommand { command } => self.execute_command(command).await,
        }
    }

    async fn execute_command(&self, command: &str) -> ExecutionOutcome {
        let mut cmd = Command::new(shell());
        cmd.arg(shell_flag())
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the child on timeout kills it — no separate handle needed.
            .kill_on_drop(true);

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                return ExecutionOutcome {
                    success: false,
                    stdout: String::new(),
                    stderr: format!("failed to spawn command: {e}"),
                    exit_code: -1,
                };
            }
        };

        match timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => ExecutionOutcome {
                success: output.status.success(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                exit_code: output.status.code().unwrap_or(-1),
            },
            Ok(Err(e)) => ExecutionOutcome {
                success: false,
                stdout: String::new(),
                stderr: format!("error waiting on command: {e}"),
                exit_code: -1,
            },
            Err(_elapsed) => ExecutionOutcome {
                success: false,
                stdout: String::new(),
                stderr: format!("command timed out after {:?}", self.timeout),
                exit_code: -1,
            },
        }
    }
}

#[cfg(unix)]
fn shell() -> &'static str {
    "/bin/sh"
}
#[cfg(unix)]
fn shell_flag() -> &'static str {
    "-c"
}

#[cfg(windows)]
fn shell() -> &'static str {
    "cmd"
}
#[cfg(windows)]
fn shell_flag() -> &'static str {
    "/C"
}
