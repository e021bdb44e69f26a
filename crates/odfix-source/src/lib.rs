//! odfix-source: file-backed test sources for odfix
//!
//! This crate provides the source-tree collaborator the repair engine edits.
//! Parsing is delegated to an external front-end that prints a JSON
//! [`FileModel`] per file; edits splice rendered statements into the text.
//!
//! Focus: byte-exact edits and reloads, so every experiment can be undone.

pub mod config;
pub mod error;
pub mod model;
pub mod tree;

pub use config::SourceConfig;
pub use error::SourceError;
pub use model::{ClassEntry, FileModel, MethodEntry};
pub use tree::FsSourceTree;

/// Result type for source operations
pub type Result<T> = std::result::Result<T, SourceError>;
