//! Oracle configuration: which commands build the project and run tests.

use std::path::{Path, PathBuf};

use odfix_core::TestId;
use serde::{Deserialize, Serialize};

/// Placeholder in test-command arguments replaced by the ordered,
/// comma-joined test ids.
pub const TESTS_PLACEHOLDER: &str = "{tests}";

/// Where the test command leaves its JSON report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportSource {
    /// Printed on stdout (the last JSON object line wins).
    Stdout,
    /// Written to a file, relative to the working directory.
    File { path: PathBuf },
}

/// Deserialized from the `[oracle]` table of `odfix.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Build command, first element is the program.
    pub build: Vec<String>,

    /// Test command; arguments may contain `{tests}`.
    pub test: Vec<String>,

    pub report: ReportSource,

    /// Directory both commands run in.
    pub workdir: PathBuf,

    /// Per-command timeout in seconds (0 disables).
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            build: vec!["mvn".into(), "-q".into(), "test-compile".into()],
            test: vec!["odfix-run-tests".into(), TESTS_PLACEHOLDER.into()],
            report: ReportSource::Stdout,
            workdir: PathBuf::from("."),
            timeout_secs: 600,
        }
    }
}

impl OracleConfig {
    /// The test command with `{tests}` expanded for `tests`.
    pub fn test_command(&self, tests: &[TestId]) -> Vec<String> {
        let joined = tests.join(",");
        self.test
            .iter()
            .map(|arg| arg.replace(TESTS_PLACEHOLDER, &joined))
            .collect()
    }

    /// Report file path, resolved against the working directory.
    pub fn report_file(&self) -> Option<PathBuf> {
        match &self.report {
            ReportSource::Stdout => None,
            ReportSource::File { path } => Some(resolve(&self.workdir, path)),
        }
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_test_command_expands_placeholder() {
        let config = OracleConfig {
            test: vec!["run".into(), "--tests={tests}".into()],
            ..Default::default()
        };
        let cmd = config.test_command(&["a.B.x".to_string(), "a.B.y".to_string()]);
        assert_eq!(cmd, vec!["run", "--tests=a.B.x,a.B.y"]);
    }

    #[test]
    fn test_parse_from_toml() {
        let config: OracleConfig = toml::from_str(
            r#"
            build = ["gradle", "testClasses"]
            test = ["gradle", "test", "--tests", "{tests}"]
            workdir = "/work"
            report = { kind = "file", path = "build/odfix.json" }
            "#,
        )
        .expect("parse");
        assert_eq!(config.build, vec!["gradle", "testClasses"]);
        assert_eq!(config.timeout_secs, 600);
        assert_eq!(config.report_file(), Some(PathBuf::from("/work/build/odfix.json")));
    }

    #[test]
    fn test_stdout_report_has_no_file() {
        assert_eq!(OracleConfig::default().report_file(), None);
    }
}
