//! Engine configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::placement::HelperCall;

/// Knobs for one repair engine instance.
///
/// Deserialized from the `[engine]` table of `odfix.toml`; every field has a
/// default so the table may be partial or absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Root for results (`polluter/`) and patch artifacts (`fixer/`).
    pub output_dir: PathBuf,
    /// Name of the synthesized helper method.
    pub helper_name: String,
    /// Helper call strategies, tried in order.
    pub placement: Vec<HelperCall>,
    /// Base class whose presence in a class chain selects legacy hook mode.
    pub legacy_base: String,
    pub legacy_setup: String,
    pub legacy_teardown: String,
    /// Exception type swallowed by generated catch-all guards.
    pub catch_type: String,
    /// Suffix for on-disk backups kept when applying fixes.
    pub backup_extension: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(".odfix"),
            helper_name: "polluterHelper".to_string(),
            placement: vec![HelperCall::NewInstance, HelperCall::Bare],
            legacy_base: "junit.framework.TestCase".to_string(),
            legacy_setup: "setUp".to_string(),
            legacy_teardown: "tearDown".to_string(),
            catch_type: "Throwable".to_string(),
            backup_extension: ".orig".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn results_dir(&self) -> PathBuf {
        self.output_dir.join("polluter")
    }

    pub fn fixer_dir(&self) -> PathBuf {
        self.output_dir.join("fixer")
    }

    /// `<file><backup_extension>` next to `path`.
    pub fn backup_path(&self, path: &Path) -> PathBuf {
        let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(&self.backup_extension);
        path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.helper_name, "polluterHelper");
        assert_eq!(config.placement, vec![HelperCall::NewInstance, HelperCall::Bare]);
        assert_eq!(config.results_dir(), PathBuf::from(".odfix/polluter"));
        assert_eq!(config.fixer_dir(), PathBuf::from(".odfix/fixer"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: EngineConfig =
            toml::from_str("helper_name = \"odHelper\"\nplacement = [\"bare\"]").expect("parse");
        assert_eq!(config.helper_name, "odHelper");
        assert_eq!(config.placement, vec![HelperCall::Bare]);
        assert_eq!(config.catch_type, "Throwable");
    }

    #[test]
    fn test_backup_path() {
        let config = EngineConfig::default();
        assert_eq!(
            config.backup_path(Path::new("src/test/FooTest.java")),
            PathBuf::from("src/test/FooTest.java.orig")
        );
    }
}
