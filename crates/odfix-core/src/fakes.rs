//! In-memory collaborators (testing only)
//!
//! - `MemorySourceTree`: a class/method model whose "files" are JSON byte
//!   buffers, so every edit and restore is observable byte for byte
//! - `ScriptedOracle`: a build/test oracle whose verdict is a closure over
//!   the sources as they currently stand
//! - `FaultyTree`: wraps another tree and injects lookup errors, slow
//!   lookups or a failing `add_method`

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{CollaboratorError, OdfixError, Result, TestId};
use crate::oracle::{BuildTestOracle, TestOutcome, TestReport};
use crate::source::{ClassHierarchy, CodeUnit, HookCategory, MethodId, SourceTree};
use crate::statement::Statement;

const MODEL_EXTENSION: &str = "json";

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodModel {
    pub name: String,
    #[serde(default)]
    pub hooks: Vec<HookCategory>,
    #[serde(default)]
    pub expects_exception: bool,
    #[serde(default)]
    pub declares_throws: bool,
    #[serde(default)]
    pub body: Vec<Statement>,
}

impl MethodModel {
    pub fn helper(name: &str, body: Vec<Statement>) -> Self {
        Self {
            name: name.to_string(),
            hooks: Vec::new(),
            expects_exception: false,
            declares_throws: false,
            body,
        }
    }

    pub fn test(name: &str, body: Vec<Statement>) -> Self {
        Self::helper(name, body)
    }

    pub fn hook(name: &str, category: HookCategory, body: Vec<Statement>) -> Self {
        let mut method = Self::helper(name, body);
        method.hooks.push(category);
        method
    }

    pub fn throwing(mut self) -> Self {
        self.declares_throws = true;
        self
    }

    pub fn expecting(mut self) -> Self {
        self.expects_exception = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassModel {
    pub name: String,
    #[serde(default)]
    pub superclass: Option<String>,
    #[serde(default)]
    pub methods: Vec<MethodModel>,
}

impl ClassModel {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            superclass: None,
            methods: Vec::new(),
        }
    }

    pub fn extends(mut self, parent: &str) -> Self {
        self.superclass = Some(parent.to_string());
        self
    }

    pub fn with_method(mut self, method: MethodModel) -> Self {
        self.methods.push(method);
        self
    }

    fn method(&self, name: &str) -> Option<(usize, &MethodModel)> {
        self.methods.iter().enumerate().find(|(_, m)| m.name == name)
    }
}

fn model_path(class: &str) -> PathBuf {
    PathBuf::from("src/test").join(format!("{}.{MODEL_EXTENSION}", class.replace('.', "/")))
}

fn source_err(message: String) -> OdfixError {
    OdfixError::Collaborator(CollaboratorError::Source(message))
}

type Files = Arc<Mutex<BTreeMap<PathBuf, Vec<u8>>>>;

/// Read-only view over the current file contents, shared with the tree.
#[derive(Debug, Clone, Default)]
pub struct Sources {
    files: Files,
}

impl Sources {
    fn classes(&self) -> Result<Vec<(PathBuf, ClassModel)>> {
        let files = self.files.lock().unwrap();
        files
            .iter()
            .filter(|(p, _)| p.extension().and_then(|e| e.to_str()) == Some(MODEL_EXTENSION))
            .map(|(p, bytes)| {
                serde_json::from_slice(bytes)
                    .map(|class| (p.clone(), class))
                    .map_err(|e| source_err(format!("{}: {e}", p.display())))
            })
            .collect()
    }

    fn class(&self, name: &str) -> Result<Option<(PathBuf, ClassModel)>> {
        Ok(self.classes()?.into_iter().find(|(_, c)| c.name == name))
    }

    /// Whether every model file parses and every `new C().m();` call names
    /// an existing method.
    pub fn compiles(&self) -> bool {
        let Ok(classes) = self.classes() else {
            return false;
        };
        let declared: HashSet<String> = classes
            .iter()
            .flat_map(|(_, c)| c.methods.iter().map(move |m| format!("{}.{}", c.name, m.name)))
            .collect();
        let mut calls = Vec::new();
        for (_, class) in &classes {
            for method in &class.methods {
                collect_plain(&method.body, &mut calls);
            }
        }
        calls.iter().all(|code| match parse_new_call(code) {
            Some((class, method)) => declared.contains(&format!("{class}.{method}")),
            None => true,
        })
    }

    /// Plain statements executed by running `test`: local per-test setup
    /// hooks, the body, then local per-test teardown hooks. Calls to known
    /// methods are expanded.
    pub fn execute(&self, test: &str) -> Vec<String> {
        let Ok(classes) = self.classes() else {
            return Vec::new();
        };
        let Ok(id) = MethodId::parse(test) else {
            return Vec::new();
        };
        let by_name: BTreeMap<&str, &ClassModel> =
            classes.iter().map(|(_, c)| (c.name.as_str(), c)).collect();
        let Some(class) = by_name.get(id.class.as_str()) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let hooks = |category: HookCategory| {
            class
                .methods
                .iter()
                .filter(move |m| m.hooks.contains(&category))
                .collect::<Vec<_>>()
        };
        for hook in hooks(HookCategory::PreTest) {
            expand(&by_name, class, &hook.body, 0, &mut out);
        }
        if let Some((_, method)) = class.method(&id.name) {
            expand(&by_name, class, &method.body, 0, &mut out);
        }
        for hook in hooks(HookCategory::PostTest) {
            expand(&by_name, class, &hook.body, 0, &mut out);
        }
        out
    }
}

fn collect_plain(statements: &[Statement], out: &mut Vec<String>) {
    for statement in statements {
        match statement {
            Statement::Plain { code } => out.push(code.clone()),
            Statement::Block { statements } => collect_plain(statements, out),
            Statement::Guarded {
                body,
                handlers,
                cleanup,
            } => {
                collect_plain(body, out);
                for h in handlers {
                    collect_plain(&h.body, out);
                }
                if let Some(cleanup) = cleanup {
                    collect_plain(cleanup, out);
                }
            }
        }
    }
}

/// `new a.B().m();` -> `("a.B", "m")`
fn parse_new_call(code: &str) -> Option<(&str, &str)> {
    let rest = code.strip_prefix("new ")?;
    let (class, rest) = rest.split_once("().")?;
    let method = rest.strip_suffix("();")?;
    Some((class, method))
}

fn expand(
    classes: &BTreeMap<&str, &ClassModel>,
    current: &ClassModel,
    statements: &[Statement],
    depth: usize,
    out: &mut Vec<String>,
) {
    let mut flat = Vec::new();
    collect_plain(statements, &mut flat);
    for code in flat {
        let target = match parse_new_call(&code) {
            Some((class, method)) => classes.get(class).copied().map(|c| (c, method.to_string())),
            None => code
                .strip_suffix("();")
                .filter(|name| current.method(name).is_some())
                .map(|name| (current, name.to_string())),
        };
        match target {
            Some((class, method)) if depth < 16 => {
                if let Some((_, m)) = class.method(&method) {
                    expand(classes, class, &m.body, depth + 1, out);
                }
            }
            _ => out.push(code),
        }
    }
}

// ---------------------------------------------------------------------------
// MemorySourceTree
// ---------------------------------------------------------------------------

/// In-memory source tree, one JSON file per class.
#[derive(Debug, Clone, Default)]
pub struct MemorySourceTree {
    sources: Sources,
}

impl MemorySourceTree {
    pub fn from_classes(classes: Vec<ClassModel>) -> Self {
        let tree = Self::default();
        {
            let mut files = tree.sources.files.lock().unwrap();
            for class in classes {
                let bytes = serde_json::to_vec_pretty(&class).unwrap();
                files.insert(model_path(&class.name), bytes);
            }
        }
        tree
    }

    /// A view that keeps tracking this tree's files.
    pub fn sources(&self) -> Sources {
        self.sources.clone()
    }

    /// Copy of every file's current bytes.
    pub fn snapshot(&self) -> BTreeMap<PathBuf, Vec<u8>> {
        self.sources.files.lock().unwrap().clone()
    }

    fn store(&self, path: &Path, class: &ClassModel) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(class)?;
        self.sources.files.lock().unwrap().insert(path.to_path_buf(), bytes);
        Ok(())
    }

    fn unit(path: &Path, class: &ClassModel, index: usize) -> CodeUnit {
        let method = &class.methods[index];
        CodeUnit {
            id: MethodId::new(&class.name, &method.name),
            path: path.to_path_buf(),
            begin_line: index + 1,
            expects_exception: method.expects_exception,
            declares_throws: method.declares_throws,
            body: method.body.clone(),
        }
    }
}

impl ClassHierarchy for MemorySourceTree {
    fn superclass(&self, class: &str) -> Result<Option<String>> {
        Ok(self.sources.class(class)?.and_then(|(_, c)| c.superclass))
    }

    fn declared_hooks(&self, class: &str, category: HookCategory) -> Result<Vec<String>> {
        Ok(self
            .sources
            .class(class)?
            .map(|(_, c)| {
                c.methods
                    .into_iter()
                    .filter(|m| m.hooks.contains(&category))
                    .map(|m| m.name)
                    .collect()
            })
            .unwrap_or_default())
    }

    fn declares_method(&self, class: &str, method: &str) -> Result<bool> {
        Ok(self
            .sources
            .class(class)?
            .is_some_and(|(_, c)| c.method(method).is_some()))
    }
}

impl SourceTree for MemorySourceTree {
    fn test_files(&self) -> Result<Vec<PathBuf>> {
        Ok(self.sources.classes()?.into_iter().map(|(p, _)| p).collect())
    }

    fn find_method(&self, id: &MethodId) -> Result<Option<CodeUnit>> {
        let Some((path, class)) = self.sources.class(&id.class)? else {
            return Ok(None);
        };
        Ok(class
            .method(&id.name)
            .map(|(index, _)| Self::unit(&path, &class, index)))
    }

    fn class_file(&self, class: &str) -> Result<Option<PathBuf>> {
        Ok(self.sources.class(class)?.map(|(p, _)| p))
    }

    fn flush(&mut self, unit: &CodeUnit) -> Result<CodeUnit> {
        let (path, mut class) = self
            .sources
            .class(&unit.id.class)?
            .ok_or_else(|| OdfixError::ClassNotFound(unit.id.class.clone()))?;
        let index = class
            .method(&unit.id.name)
            .map(|(i, _)| i)
            .ok_or_else(|| OdfixError::MethodNotFound(unit.id.qualified()))?;
        class.methods[index].body = unit.body.clone();
        self.store(&path, &class)?;
        Ok(Self::unit(&path, &class, index))
    }

    fn add_method(&mut self, class_name: &str, name: &str) -> Result<CodeUnit> {
        let (path, mut class) = self
            .sources
            .class(class_name)?
            .ok_or_else(|| OdfixError::ClassNotFound(class_name.to_string()))?;
        class.methods.push(MethodModel::helper(name, Vec::new()));
        self.store(&path, &class)?;
        Ok(Self::unit(&path, &class, class.methods.len() - 1))
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        self.sources
            .files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| {
                OdfixError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    path.display().to_string(),
                ))
            })
    }

    fn write_file(&mut self, path: &Path, bytes: &[u8]) -> Result<()> {
        self.sources
            .files
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), bytes.to_vec());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ScriptedOracle
// ---------------------------------------------------------------------------

type Script = dyn Fn(&Sources, &[TestId]) -> TestReport + Send + Sync;

/// Deterministic oracle over a [`MemorySourceTree`].
///
/// `rebuild` succeeds when [`Sources::compiles`]; `run_tests` hands the
/// current sources and the order to the script.
pub struct ScriptedOracle {
    sources: Sources,
    script: Box<Script>,
    rebuilds: AtomicUsize,
    runs: AtomicUsize,
}

impl ScriptedOracle {
    pub fn new<F>(sources: Sources, script: F) -> Self
    where
        F: Fn(&Sources, &[TestId]) -> TestReport + Send + Sync + 'static,
    {
        Self {
            sources,
            script: Box::new(script),
            rebuilds: AtomicUsize::new(0),
            runs: AtomicUsize::new(0),
        }
    }

    /// Tests fail when a `poison` statement executed earlier in the order
    /// (or earlier in the same test) precedes a `check` statement, until a
    /// `clean` statement runs.
    pub fn shared_state(sources: Sources, poison: &str, clean: &str, check: &str) -> Self {
        let (poison, clean, check) = (poison.to_string(), clean.to_string(), check.to_string());
        Self::new(sources, move |sources, order| {
            let mut polluted = false;
            order
                .iter()
                .map(|test| {
                    let mut outcome = TestOutcome::Pass;
                    for code in sources.execute(test) {
                        if code == poison {
                            polluted = true;
                        } else if code == clean {
                            polluted = false;
                        } else if code == check && polluted {
                            outcome = TestOutcome::Fail;
                        }
                    }
                    (test.clone(), outcome)
                })
                .collect()
        })
    }

    pub fn rebuilds(&self) -> usize {
        self.rebuilds.load(Ordering::SeqCst)
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BuildTestOracle for ScriptedOracle {
    async fn rebuild(&self) -> std::result::Result<(), CollaboratorError> {
        self.rebuilds.fetch_add(1, Ordering::SeqCst);
        if self.sources.compiles() {
            Ok(())
        } else {
            Err(CollaboratorError::Build("sources do not compile".into()))
        }
    }

    async fn run_tests(&self, tests: &[TestId]) -> std::result::Result<TestReport, CollaboratorError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok((self.script)(&self.sources, tests))
    }
}

// ---------------------------------------------------------------------------
// FaultyTree
// ---------------------------------------------------------------------------

/// Delegating source tree with injected faults.
pub struct FaultyTree<S> {
    inner: S,
    /// Fail the n-th (1-based) lookup of a method.
    failing_lookup: Option<(MethodId, usize)>,
    slow_lookup: Option<(MethodId, Duration)>,
    failing_add: bool,
    lookups: Mutex<BTreeMap<MethodId, usize>>,
}

impl<S: SourceTree> FaultyTree<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            failing_lookup: None,
            slow_lookup: None,
            failing_add: false,
            lookups: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn failing_lookup(mut self, id: MethodId, nth: usize) -> Self {
        self.failing_lookup = Some((id, nth));
        self
    }

    /// Every lookup of `id` blocks for `delay` before answering.
    pub fn slow_lookup(mut self, id: MethodId, delay: Duration) -> Self {
        self.slow_lookup = Some((id, delay));
        self
    }

    pub fn failing_add_method(mut self) -> Self {
        self.failing_add = true;
        self
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Lookups of `id` seen so far.
    pub fn lookups(&self, id: &MethodId) -> usize {
        self.lookups.lock().unwrap().get(id).copied().unwrap_or(0)
    }
}

fn injected(what: &str) -> OdfixError {
    OdfixError::Io(std::io::Error::new(std::io::ErrorKind::Other, format!("injected {what} failure")))
}

impl<S: SourceTree> ClassHierarchy for FaultyTree<S> {
    fn superclass(&self, class: &str) -> Result<Option<String>> {
        self.inner.superclass(class)
    }

    fn declared_hooks(&self, class: &str, category: HookCategory) -> Result<Vec<String>> {
        self.inner.declared_hooks(class, category)
    }

    fn declares_method(&self, class: &str, method: &str) -> Result<bool> {
        self.inner.declares_method(class, method)
    }
}

impl<S: SourceTree> SourceTree for FaultyTree<S> {
    fn test_files(&self) -> Result<Vec<PathBuf>> {
        self.inner.test_files()
    }

    fn find_method(&self, id: &MethodId) -> Result<Option<CodeUnit>> {
        let seen = {
            let mut lookups = self.lookups.lock().unwrap();
            let count = lookups.entry(id.clone()).or_insert(0);
            *count += 1;
            *count
        };
        if let Some((slow, delay)) = &self.slow_lookup {
            if slow == id {
                std::thread::sleep(*delay);
            }
        }
        if let Some((failing, nth)) = &self.failing_lookup {
            if failing == id && *nth == seen {
                return Err(injected("lookup"));
            }
        }
        self.inner.find_method(id)
    }

    fn class_file(&self, class: &str) -> Result<Option<PathBuf>> {
        self.inner.class_file(class)
    }

    fn flush(&mut self, unit: &CodeUnit) -> Result<CodeUnit> {
        self.inner.flush(unit)
    }

    fn add_method(&mut self, class: &str, name: &str) -> Result<CodeUnit> {
        if self.failing_add {
            return Err(injected("add_method"));
        }
        self.inner.add_method(class, name)
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        self.inner.read_file(path)
    }

    fn write_file(&mut self, path: &Path, bytes: &[u8]) -> Result<()> {
        self.inner.write_file(path, bytes)
    }
}
