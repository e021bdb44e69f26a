//! odfix runner - command-backed build-and-test oracle
//!
//! Provides a [`odfix_core::BuildTestOracle`] that:
//! - Rebuilds the project with a configured build command
//! - Runs an ordered test list through a configured test command
//! - Reads per-test outcomes from a JSON report on stdout or in a file

pub mod command;
pub mod config;
pub mod error;
pub mod oracle;
pub mod report;

// Re-export key types
pub use command::{run_command, CommandOutput};
pub use config::{OracleConfig, ReportSource, TESTS_PLACEHOLDER};
pub use error::{Result, RunnerError};
pub use oracle::CommandOracle;
pub use report::{parse_report, parse_stdout_report};
