//! Domain-level error taxonomy for odfix.

/// Errors raised by a source-tree or build/test collaborator.
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    #[error("build tool failed: {0}")]
    Build(String),

    #[error("test runner failed: {0}")]
    TestRun(String),

    #[error("source tree error: {0}")]
    Source(String),
}

/// odfix domain errors.
#[derive(Debug, thiserror::Error)]
pub enum OdfixError {
    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("class not found: {0}")]
    ClassNotFound(String),

    #[error("invalid test identifier: {0}")]
    InvalidTestId(String),

    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("artifact error: {0}")]
    Artifact(String),

    #[error("collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for odfix domain operations.
pub type Result<T> = std::result::Result<T, OdfixError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_odfix_error_display() {
        let err = OdfixError::MethodNotFound("com.example.FooTest.testBar".to_string());
        assert!(err.to_string().contains("method not found"));
        assert!(err.to_string().contains("FooTest.testBar"));

        let err = OdfixError::InvalidTestId("noDots".to_string());
        assert!(err.to_string().contains("invalid test identifier"));
    }

    #[test]
    fn test_digest_mismatch_error() {
        let err = OdfixError::DigestMismatch {
            expected: "abc123".to_string(),
            actual: "def456".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("abc123"));
        assert!(msg.contains("def456"));
    }

    #[test]
    fn test_collaborator_error_converts() {
        let err: OdfixError = CollaboratorError::Build("exit code 1".to_string()).into();
        assert!(err.to_string().contains("build tool failed"));
    }
}
