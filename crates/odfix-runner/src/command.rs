//! External command execution with a per-command timeout.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::debug;

use crate::error::{Result, RunnerError};

/// Captured result of one command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Name the command was run under (`build`, `test`).
    pub name: String,

    /// Exit code (-1 when killed by a signal).
    pub exit_code: i32,

    pub stdout: String,

    pub stderr: String,

    pub duration_ms: u64,

    pub success: bool,
}

impl CommandOutput {
    /// Whether the command exited with code 0.
    pub fn passed(&self) -> bool {
        self.success && self.exit_code == 0
    }

    /// Last `lines` lines of stderr, for error messages.
    pub fn stderr_tail(&self, lines: usize) -> String {
        let all: Vec<&str> = self.stderr.lines().collect();
        all[all.len().saturating_sub(lines)..].join("\n")
    }
}

/// Run `argv` in `workdir`, killing it after `timeout_secs` (0 disables the
/// timeout).
pub async fn run_command(
    name: &str,
    argv: &[String],
    workdir: &Path,
    timeout_secs: u64,
) -> Result<CommandOutput> {
    let start = Instant::now();

    let Some((program, args)) = argv.split_first() else {
        return Err(RunnerError::EmptyCommand {
            name: name.to_string(),
        });
    };

    let child = Command::new(program)
        .args(args)
        .current_dir(workdir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| RunnerError::Spawn {
            name: name.to_string(),
            program: program.clone(),
            source,
        })?;

    let output = if timeout_secs > 0 {
        tokio::time::timeout(Duration::from_secs(timeout_secs), child.wait_with_output())
            .await
            .map_err(|_| RunnerError::Timeout {
                name: name.to_string(),
                secs: timeout_secs,
            })??
    } else {
        child.wait_with_output().await?
    };

    let duration_ms = start.elapsed().as_millis() as u64;
    let exit_code = output.status.code().unwrap_or(-1);
    debug!(command = name, exit_code, duration_ms, "command finished");

    Ok(CommandOutput {
        name: name.to_string(),
        exit_code,
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        duration_ms,
        success: output.status.success(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_output_passed() {
        let output = CommandOutput {
            name: "build".to_string(),
            exit_code: 1,
            stdout: String::new(),
            stderr: "a\nb\nc".to_string(),
            duration_ms: 5,
            success: false,
        };
        assert!(!output.passed());
        assert_eq!(output.stderr_tail(2), "b\nc");
        assert_eq!(output.stderr_tail(10), "a\nb\nc");
    }

    #[tokio::test]
    async fn test_run_simple_command() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output = run_command("echo", &argv(&["echo", "hello"]), dir.path(), 60)
            .await
            .expect("run");
        assert!(output.passed());
        assert!(output.stdout.contains("hello"));
    }

    #[tokio::test]
    async fn test_run_failing_command() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output = run_command("false", &argv(&["false"]), dir.path(), 60)
            .await
            .expect("run");
        assert!(!output.passed());
        assert_ne!(output.exit_code, 0);
    }

    #[tokio::test]
    async fn test_run_times_out() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = run_command("sleep", &argv(&["sleep", "5"]), dir.path(), 1)
            .await
            .expect_err("should time out");
        assert!(matches!(err, RunnerError::Timeout { secs: 1, .. }));
    }

    #[tokio::test]
    async fn test_empty_command() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = run_command("build", &[], dir.path(), 0)
            .await
            .expect_err("empty");
        assert!(matches!(err, RunnerError::EmptyCommand { .. }));
    }
}
