//! Source-tree collaborator interface and scoped file backups.
//!
//! The engine never parses source itself. It asks a [`SourceTree`] to locate
//! methods as [`CodeUnit`]s, edits their statement sequences in memory, and
//! flushes them back to disk before consulting the oracle. Every file touched
//! during an experiment is captured first by a [`FileBackup`] guard, which
//! writes the captured bytes back on request and again on drop.

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::{class_of, method_of, OdfixError, Result};
use crate::obs::emit_restore_error;
use crate::statement::Statement;

/// Fully qualified method identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MethodId {
    pub class: String,
    pub name: String,
}

impl MethodId {
    pub fn new(class: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            name: name.into(),
        }
    }

    /// Split a `package.Class.method` test identifier.
    pub fn parse(test: &str) -> Result<Self> {
        let class = class_of(test);
        let name = method_of(test);
        if class.is_empty() || name.is_empty() {
            return Err(OdfixError::InvalidTestId(test.to_string()));
        }
        Ok(Self::new(class, name))
    }

    pub fn qualified(&self) -> String {
        format!("{}.{}", self.class, self.name)
    }
}

impl std::fmt::Display for MethodId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.class, self.name)
    }
}

/// Lifecycle hook categories recognized by annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookCategory {
    PreSuite,
    PreTest,
    PostTest,
    PostSuite,
}

impl HookCategory {
    pub fn is_pre(&self) -> bool {
        matches!(self, HookCategory::PreSuite | HookCategory::PreTest)
    }

    pub fn is_suite(&self) -> bool {
        matches!(self, HookCategory::PreSuite | HookCategory::PostSuite)
    }
}

/// A located, editable method body.
///
/// The body is an in-memory copy; nothing reaches disk until the unit is
/// passed to [`SourceTree::flush`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeUnit {
    pub id: MethodId,
    pub path: PathBuf,
    /// 1-based line of the method declaration.
    pub begin_line: usize,
    /// Annotated as expected to throw.
    pub expects_exception: bool,
    /// Declares checked exceptions in its signature.
    pub declares_throws: bool,
    pub body: Vec<Statement>,
}

impl CodeUnit {
    /// Copy of this unit with `statements` placed before the current body.
    pub fn prepended(&self, statements: &[Statement]) -> Self {
        let mut unit = self.clone();
        unit.body = statements.iter().chain(self.body.iter()).cloned().collect();
        unit
    }

    /// Copy of this unit with its body replaced.
    pub fn with_body(&self, body: Vec<Statement>) -> Self {
        let mut unit = self.clone();
        unit.body = body;
        unit
    }
}

/// Class-level capability queries used for lifecycle hook resolution.
pub trait ClassHierarchy {
    /// Direct superclass of `class`, if it has one.
    fn superclass(&self, class: &str) -> Result<Option<String>>;

    /// Names of methods declared directly in `class` under `category`.
    fn declared_hooks(&self, class: &str, category: HookCategory) -> Result<Vec<String>>;

    /// Whether `class` itself declares a method called `method`.
    fn declares_method(&self, class: &str, method: &str) -> Result<bool>;
}

/// Editable view of a project's test sources.
pub trait SourceTree: ClassHierarchy + Send + Sync {
    /// Source files under the test root.
    fn test_files(&self) -> Result<Vec<PathBuf>>;

    /// Locate a method; `Ok(None)` when no loaded file declares it.
    fn find_method(&self, id: &MethodId) -> Result<Option<CodeUnit>>;

    /// File declaring `class`.
    fn class_file(&self, class: &str) -> Result<Option<PathBuf>>;

    /// Write `unit`'s body to disk and return a freshly reloaded view.
    fn flush(&mut self, unit: &CodeUnit) -> Result<CodeUnit>;

    /// Declare a new empty, no-argument method in `class` and return it.
    fn add_method(&mut self, class: &str, name: &str) -> Result<CodeUnit>;

    fn read_file(&self, path: &Path) -> Result<Vec<u8>>;

    fn write_file(&mut self, path: &Path, bytes: &[u8]) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Scoped backups
// ---------------------------------------------------------------------------

/// Scoped guard over a source tree that records original file bytes.
///
/// Dereferences to the wrapped tree, so experiments edit through the guard.
/// [`FileBackup::restore`] may be called any number of times; dropping the
/// guard restores once more.
pub struct FileBackup<'a, S: SourceTree + ?Sized> {
    tree: &'a mut S,
    saved: Vec<(PathBuf, Vec<u8>)>,
}

impl<'a, S: SourceTree + ?Sized> FileBackup<'a, S> {
    pub fn new(tree: &'a mut S) -> Self {
        Self {
            tree,
            saved: Vec::new(),
        }
    }

    /// Record `path`'s current bytes unless they are already recorded.
    pub fn capture(&mut self, path: &Path) -> Result<()> {
        if self.saved.iter().any(|(p, _)| p == path) {
            return Ok(());
        }
        let bytes = self.tree.read_file(path)?;
        self.saved.push((path.to_path_buf(), bytes));
        Ok(())
    }

    /// Capture the file declaring `class`.
    pub fn capture_class(&mut self, class: &str) -> Result<PathBuf> {
        let path = self
            .tree
            .class_file(class)?
            .ok_or_else(|| OdfixError::ClassNotFound(class.to_string()))?;
        self.capture(&path)?;
        Ok(path)
    }

    pub fn touched(&self) -> impl Iterator<Item = &Path> {
        self.saved.iter().map(|(p, _)| p.as_path())
    }

    /// Write back every captured file whose bytes differ from the capture.
    ///
    /// Attempts every file and reports the first error.
    pub fn restore(&mut self) -> Result<()> {
        let mut first_err = None;
        for (path, bytes) in &self.saved {
            if let Err(err) = restore_one(&mut *self.tree, path, bytes) {
                emit_restore_error(path, &err);
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Restore a single captured file.
    pub fn restore_only(&mut self, path: &Path) -> Result<()> {
        match self.saved.iter().find(|(p, _)| p == path) {
            Some((path, bytes)) => restore_one(&mut *self.tree, path, bytes),
            None => Ok(()),
        }
    }
}

fn restore_one<S: SourceTree + ?Sized>(tree: &mut S, path: &Path, bytes: &[u8]) -> Result<()> {
    let current = tree.read_file(path).ok();
    if current.as_deref() == Some(bytes) {
        return Ok(());
    }
    tree.write_file(path, bytes)
}

impl<S: SourceTree + ?Sized> Deref for FileBackup<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        &*self.tree
    }
}

impl<S: SourceTree + ?Sized> DerefMut for FileBackup<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut *self.tree
    }
}

impl<S: SourceTree + ?Sized> Drop for FileBackup<'_, S> {
    fn drop(&mut self) {
        // restore() already logs each failure
        let _ = self.restore();
    }
}
