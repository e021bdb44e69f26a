//! [`BuildTestOracle`] backed by external build and test commands.

use async_trait::async_trait;
use odfix_core::{BuildTestOracle, CollaboratorError, TestId, TestReport};
use tracing::{debug, info, warn};

use crate::command::run_command;
use crate::config::OracleConfig;
use crate::error::{Result, RunnerError};
use crate::report::{parse_report, parse_stdout_report};

const STDERR_TAIL: usize = 20;

/// Runs the configured commands; one instance per project.
#[derive(Debug, Clone)]
pub struct CommandOracle {
    config: OracleConfig,
}

impl CommandOracle {
    pub fn new(config: OracleConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    async fn build(&self) -> Result<()> {
        let output = run_command(
            "build",
            &self.config.build,
            &self.config.workdir,
            self.config.timeout_secs,
        )
        .await?;
        if !output.passed() {
            return Err(RunnerError::Failed {
                name: output.name.clone(),
                code: output.exit_code,
                stderr: output.stderr_tail(STDERR_TAIL),
            });
        }
        debug!(duration_ms = output.duration_ms, "build succeeded");
        Ok(())
    }

    async fn test(&self, tests: &[TestId]) -> Result<TestReport> {
        let report_file = self.config.report_file();
        if let Some(path) = &report_file {
            // a stale report must never be read as this run's
            if path.exists() {
                std::fs::remove_file(path)?;
            }
        }

        let argv = self.config.test_command(tests);
        let output = run_command("test", &argv, &self.config.workdir, self.config.timeout_secs).await?;
        // a non-zero exit usually just means some test failed
        if !output.passed() {
            debug!(exit_code = output.exit_code, "test command exited non-zero");
        }

        let report = match report_file {
            Some(path) => {
                let text = std::fs::read_to_string(&path).map_err(|e| {
                    RunnerError::Report(format!("{}: {e}", path.display()))
                })?;
                parse_report(&text)?
            }
            None => parse_stdout_report(&output.stdout)?,
        };
        info!(
            requested = tests.len(),
            reported = report.results.len(),
            duration_ms = output.duration_ms,
            "tests ran"
        );
        Ok(report)
    }
}

#[async_trait]
impl BuildTestOracle for CommandOracle {
    async fn rebuild(&self) -> std::result::Result<(), CollaboratorError> {
        self.build().await.map_err(|err| {
            debug!(error = %err, "build failed");
            err.into_collaborator(true)
        })
    }

    async fn run_tests(&self, tests: &[TestId]) -> std::result::Result<TestReport, CollaboratorError> {
        self.test(tests).await.map_err(|err| {
            warn!(error = %err, "test run failed");
            err.into_collaborator(false)
        })
    }
}
