//! Applying a discovered fix to the source tree for good.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::domain::{OdfixError, Result, Status};
use crate::placement::HelperCall;
use crate::source::{CodeUnit, MethodId, SourceTree};
use crate::statement::Statement;

/// A working fix for one victim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixPatch {
    pub victim: MethodId,
    /// Class that receives the helper when the fix is not inlined.
    pub source_class: String,
    pub call: HelperCall,
    pub block: Vec<Statement>,
    pub inlined: bool,
    pub status: Status,
}

/// Original bytes of every file an applied fix touched.
#[derive(Debug, Clone, Default)]
pub struct AppliedFix {
    originals: Vec<(PathBuf, Vec<u8>)>,
}

impl AppliedFix {
    pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.originals.iter().map(|(p, _)| p)
    }

    /// Put every touched file back.
    pub fn revert<S: SourceTree + ?Sized>(&self, tree: &mut S) -> Result<()> {
        for (path, bytes) in &self.originals {
            tree.write_file(path, bytes)?;
        }
        Ok(())
    }

    /// Save the originals next to their files with the configured backup
    /// extension.
    pub fn write_backups<S: SourceTree + ?Sized>(
        &self,
        tree: &mut S,
        config: &EngineConfig,
    ) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(self.originals.len());
        for (path, bytes) in &self.originals {
            let backup = config.backup_path(path);
            tree.write_file(&backup, bytes)?;
            written.push(backup);
        }
        Ok(written)
    }

    fn remember<S: SourceTree + ?Sized>(&mut self, tree: &S, path: PathBuf) -> Result<()> {
        if !self.originals.iter().any(|(p, _)| *p == path) {
            let bytes = tree.read_file(&path)?;
            self.originals.push((path, bytes));
        }
        Ok(())
    }
}

impl FixPatch {
    /// Write the fix into the tree.
    ///
    /// Inlined fixes are prepended to the victim. Otherwise the victim gets
    /// the helper call and the source class gets a helper holding the block.
    /// When any edit fails, files already edited are reverted before the
    /// error is returned.
    pub fn apply<S: SourceTree + ?Sized>(&self, tree: &mut S, config: &EngineConfig) -> Result<AppliedFix> {
        let mut applied = AppliedFix::default();
        let victim = tree
            .find_method(&self.victim)?
            .ok_or_else(|| OdfixError::MethodNotFound(self.victim.qualified()))?;
        applied.remember(tree, victim.path.clone())?;

        if let Err(err) = self.write(tree, &victim, config, &mut applied) {
            if let Err(revert_err) = applied.revert(tree) {
                warn!(victim = %self.victim, error = %revert_err, "could not revert partially applied fix");
            }
            return Err(err);
        }

        info!(victim = %self.victim, inlined = self.inlined, "fix applied");
        Ok(applied)
    }

    fn write<S: SourceTree + ?Sized>(
        &self,
        tree: &mut S,
        victim: &CodeUnit,
        config: &EngineConfig,
        applied: &mut AppliedFix,
    ) -> Result<()> {
        if self.inlined {
            tree.flush(&victim.prepended(&self.block))?;
            return Ok(());
        }

        let helper_file = tree
            .class_file(&self.source_class)?
            .ok_or_else(|| OdfixError::ClassNotFound(self.source_class.clone()))?;
        applied.remember(tree, helper_file)?;

        let call = self.call.statement(&self.source_class, &config.helper_name);
        tree.flush(&victim.prepended(&[call]))?;
        let helper = tree.add_method(&self.source_class, &config.helper_name)?;
        tree.flush(&helper.with_body(self.block.clone()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{ClassModel, FaultyTree, MemorySourceTree, MethodModel};

    fn p(code: &str) -> Statement {
        Statement::plain(code)
    }

    fn tree() -> MemorySourceTree {
        MemorySourceTree::from_classes(vec![
            ClassModel::new("a.PTest").with_method(MethodModel::test("polluter", vec![p("b();")])),
            ClassModel::new("a.VTest").with_method(MethodModel::test("victim", vec![p("check();")])),
        ])
    }

    fn fix(inlined: bool) -> FixPatch {
        FixPatch {
            victim: MethodId::new("a.VTest", "victim"),
            source_class: "a.PTest".into(),
            call: HelperCall::NewInstance,
            block: vec![p("b();")],
            inlined,
            status: Status::FixInline,
        }
    }

    fn body(tree: &MemorySourceTree, class: &str, name: &str) -> Vec<Statement> {
        tree.find_method(&MethodId::new(class, name))
            .expect("lookup")
            .expect("present")
            .body
    }

    #[test]
    fn test_apply_inline_then_revert() {
        let mut tree = tree();
        let before = tree.snapshot();
        let applied = fix(true).apply(&mut tree, &EngineConfig::default()).expect("apply");
        assert_eq!(body(&tree, "a.VTest", "victim"), vec![p("b();"), p("check();")]);
        assert_eq!(applied.paths().count(), 1);
        applied.revert(&mut tree).expect("revert");
        assert_eq!(tree.snapshot(), before);
    }

    #[test]
    fn test_apply_through_helper() {
        let mut tree = tree();
        let config = EngineConfig::default();
        let applied = fix(false).apply(&mut tree, &config).expect("apply");
        assert_eq!(
            body(&tree, "a.VTest", "victim"),
            vec![p("new a.PTest().polluterHelper();"), p("check();")]
        );
        assert_eq!(body(&tree, "a.PTest", "polluterHelper"), vec![p("b();")]);

        let backups = applied.write_backups(&mut tree, &config).expect("backups");
        assert_eq!(backups.len(), 2);
        assert!(backups.iter().all(|b| b.to_string_lossy().ends_with(".orig")));
    }

    #[test]
    fn test_failed_apply_reverts_edited_files() {
        let mut tree = FaultyTree::new(tree()).failing_add_method();
        let before = tree.inner().snapshot();
        let err = fix(false).apply(&mut tree, &EngineConfig::default());
        assert!(err.is_err());
        assert_eq!(tree.inner().snapshot(), before);
    }
}
