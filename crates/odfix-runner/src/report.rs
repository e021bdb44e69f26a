//! Per-test JSON report parsing.
//!
//! The expected shape is a serialized [`TestReport`]:
//!
//! ```json
//! {"results": {"com.acme.FooTest.testA": "pass", "com.acme.FooTest.testB": "fail"}}
//! ```

use odfix_core::TestReport;

use crate::error::{Result, RunnerError};

/// Parse a report document.
pub fn parse_report(text: &str) -> Result<TestReport> {
    serde_json::from_str(text.trim()).map_err(|e| RunnerError::Report(e.to_string()))
}

/// Parse a report printed on stdout among other output: the whole text if it
/// is a report, otherwise the last line that is.
pub fn parse_stdout_report(stdout: &str) -> Result<TestReport> {
    if let Ok(report) = parse_report(stdout) {
        return Ok(report);
    }
    stdout
        .lines()
        .rev()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .find_map(|line| parse_report(line).ok())
        .ok_or_else(|| RunnerError::Report("no JSON report on stdout".to_string()))
}
