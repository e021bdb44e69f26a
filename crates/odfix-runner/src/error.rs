//! Runner error taxonomy.

use odfix_core::CollaboratorError;

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("{name}: command is empty")]
    EmptyCommand { name: String },

    #[error("{name}: could not start `{program}`: {source}")]
    Spawn {
        name: String,
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{name}: timed out after {secs} seconds")]
    Timeout { name: String, secs: u64 },

    #[error("{name}: exited with code {code}: {stderr}")]
    Failed {
        name: String,
        code: i32,
        stderr: String,
    },

    #[error("malformed test report: {0}")]
    Report(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RunnerError>;

impl RunnerError {
    /// Map into the engine's collaborator taxonomy, as a build failure when
    /// `building`, otherwise a test-run failure.
    pub fn into_collaborator(self, building: bool) -> CollaboratorError {
        if building {
            CollaboratorError::Build(self.to_string())
        } else {
            CollaboratorError::TestRun(self.to_string())
        }
    }
}
