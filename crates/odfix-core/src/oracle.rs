//! Build-and-test oracle adapter.
//!
//! Backends implement [`BuildTestOracle`]: rebuild the project and run an
//! ordered list of tests, reporting each test's result. [`OrderOracle`]
//! reduces that to the single question the engine asks of every experiment:
//! did this ordered list run clean.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{CollaboratorError, TestId};
use crate::metrics::METRICS;

// ---------------------------------------------------------------------------
// Backend trait
// ---------------------------------------------------------------------------

/// Per-test result reported by a test runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestOutcome {
    Pass,
    Fail,
    Error,
    Skipped,
}

/// Results of one test-runner invocation, keyed by test id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestReport {
    #[serde(default)]
    pub results: BTreeMap<TestId, TestOutcome>,
}

impl TestReport {
    pub fn outcome(&self, test: &str) -> Option<TestOutcome> {
        self.results.get(test).copied()
    }
}

impl FromIterator<(TestId, TestOutcome)> for TestReport {
    fn from_iter<I: IntoIterator<Item = (TestId, TestOutcome)>>(iter: I) -> Self {
        Self {
            results: iter.into_iter().collect(),
        }
    }
}

/// External build tool and test runner.
///
/// Calls mutate build output on disk; callers must not overlap them.
#[async_trait]
pub trait BuildTestOracle: Send + Sync {
    /// Rebuild the project. `Err` means the build did not succeed.
    async fn rebuild(&self) -> std::result::Result<(), CollaboratorError>;

    /// Run `tests` in the given order and collect per-test results.
    async fn run_tests(&self, tests: &[TestId]) -> std::result::Result<TestReport, CollaboratorError>;
}

// ---------------------------------------------------------------------------
// Order-level verdicts
// ---------------------------------------------------------------------------

/// Verdict for one ordered test list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderOutcome {
    AllNotFailing,
    SomeFailed,
    /// The build failed or the runner could not produce a report.
    Error,
}

impl OrderOutcome {
    pub fn fails(&self) -> bool {
        !matches!(self, OrderOutcome::AllNotFailing)
    }
}

/// Wraps a backend and answers order-level questions.
pub struct OrderOracle<O> {
    backend: O,
}

impl<O: BuildTestOracle> OrderOracle<O> {
    pub fn new(backend: O) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &O {
        &self.backend
    }

    /// Rebuild; `false` when the build fails.
    pub async fn rebuild(&self) -> bool {
        METRICS.inc_rebuilds();
        match self.backend.rebuild().await {
            Ok(()) => true,
            Err(err) => {
                debug!(error = %err, "rebuild failed");
                false
            }
        }
    }

    /// Run `tests` against the current build.
    ///
    /// An empty list never fails. A test missing from the report counts as
    /// not passing; skipped tests count as not failing.
    pub async fn check_order(&self, tests: &[TestId]) -> OrderOutcome {
        if tests.is_empty() {
            return OrderOutcome::AllNotFailing;
        }
        METRICS.inc_test_runs();
        let report = match self.backend.run_tests(tests).await {
            Ok(report) => report,
            Err(err) => {
                debug!(error = %err, "test run failed");
                return OrderOutcome::Error;
            }
        };
        let all_ok = tests.iter().all(|t| {
            matches!(
                report.outcome(t),
                Some(TestOutcome::Pass) | Some(TestOutcome::Skipped)
            )
        });
        if all_ok {
            OrderOutcome::AllNotFailing
        } else {
            OrderOutcome::SomeFailed
        }
    }

    /// Rebuild, then run `tests`. A build failure yields [`OrderOutcome::Error`].
    pub async fn rebuild_and_check(&self, tests: &[TestId]) -> OrderOutcome {
        if !self.rebuild().await {
            return OrderOutcome::Error;
        }
        self.check_order(tests).await
    }

    /// Whether running `tests` against the current build does not run clean.
    pub async fn test_order_fails(&self, tests: &[TestId]) -> bool {
        self.check_order(tests).await.fails()
    }
}
