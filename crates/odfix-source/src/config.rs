//! Source tree configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Placeholder in [`SourceConfig::helper_signature`] replaced by the method name.
pub const NAME_PLACEHOLDER: &str = "{name}";

/// Deserialized from the `[source]` table of `odfix.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Root of the test sources.
    pub root: PathBuf,

    /// File extensions (without the dot) treated as test sources.
    pub extensions: Vec<String>,

    /// Parser front-end; the file path is appended as the last argument and
    /// the JSON file model is read from stdout.
    pub parser: Vec<String>,

    /// Test annotation member marking a test as expected to throw.
    pub expected_member: String,

    /// Declaration line for synthesized methods, without the opening brace.
    pub helper_signature: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("src/test/java"),
            extensions: vec!["java".to_string()],
            parser: vec!["odfix-parse".to_string()],
            expected_member: "expected".to_string(),
            helper_signature: format!("public void {NAME_PLACEHOLDER}()"),
        }
    }
}

impl SourceConfig {
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Whether `path` has one of the configured extensions.
    pub fn is_source(&self, path: &std::path::Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|x| x == ext))
    }

    pub fn helper_declaration(&self, name: &str) -> String {
        self.helper_signature.replace(NAME_PLACEHOLDER, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_defaults() {
        let config = SourceConfig::default();
        assert!(config.is_source(Path::new("a/FooTest.java")));
        assert!(!config.is_source(Path::new("a/FooTest.kt")));
        assert_eq!(config.helper_declaration("polluterHelper"), "public void polluterHelper()");
    }

    #[test]
    fn test_partial_toml() {
        let config: SourceConfig = toml::from_str(
            r#"
            root = "tests"
            extensions = ["java", "groovy"]
            "#,
        )
        .expect("parse");
        assert_eq!(config.root, PathBuf::from("tests"));
        assert!(config.is_source(Path::new("x.groovy")));
        assert_eq!(config.expected_member, "expected");
    }
}
