//! Error types for odfix-source

use odfix_core::{CollaboratorError, OdfixError};
use thiserror::Error;

/// Errors that can occur reading, parsing or editing test sources
#[derive(Error, Debug)]
pub enum SourceError {
    /// Parser front-end is not configured
    #[error("no parser command configured")]
    ParserNotConfigured,

    /// Parser front-end exited unsuccessfully
    #[error("parser failed on {path}: {stderr}")]
    ParserFailed { path: String, stderr: String },

    /// Parser output does not describe the file
    #[error("invalid file model for {path}: {reason}")]
    InvalidModel { path: String, reason: String },

    /// Class not declared in any test file
    #[error("class not found: {0}")]
    ClassNotFound(String),

    /// Method not declared in its class
    #[error("method not found: {0}")]
    MethodNotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<SourceError> for OdfixError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Io(io) => OdfixError::Io(io),
            SourceError::ClassNotFound(class) => OdfixError::ClassNotFound(class),
            SourceError::MethodNotFound(method) => OdfixError::MethodNotFound(method),
            other => OdfixError::Collaborator(CollaboratorError::Source(other.to_string())),
        }
    }
}
