//! [`SourceTree`] over real files, parsed by an external front-end.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;

use odfix_core::{ClassHierarchy, CodeUnit, HookCategory, MethodId, SourceTree};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::config::SourceConfig;
use crate::error::SourceError;
use crate::model::{insert_method, splice_body, ClassEntry, FileModel, MethodEntry};
use crate::Result;

type EngineResult<T> = odfix_core::Result<T>;

/// Parsed model of one file, valid while the file hashes to `digest`.
#[derive(Debug, Clone)]
struct Cached {
    digest: String,
    model: FileModel,
}

/// File-backed source tree rooted at [`SourceConfig::root`].
#[derive(Debug)]
pub struct FsSourceTree {
    config: SourceConfig,
    cache: Mutex<HashMap<PathBuf, Cached>>,
}

impl FsSourceTree {
    pub fn new(config: SourceConfig) -> Self {
        Self {
            config,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// Parse `path`, reusing the cached model while its content is unchanged.
    pub fn model(&self, path: &Path) -> Result<FileModel> {
        let content = std::fs::read(path)?;
        let digest = hex::encode(Sha256::digest(&content));
        if let Ok(cache) = self.cache.lock() {
            if let Some(hit) = cache.get(path).filter(|c| c.digest == digest) {
                return Ok(hit.model.clone());
            }
        }

        let model = self.run_parser(path)?;
        let lines = String::from_utf8_lossy(&content).lines().count();
        model.validate(&path.display().to_string(), lines)?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(
                path.to_path_buf(),
                Cached {
                    digest,
                    model: model.clone(),
                },
            );
        }
        Ok(model)
    }

    fn run_parser(&self, path: &Path) -> Result<FileModel> {
        let (program, args) = self
            .config
            .parser
            .split_first()
            .ok_or(SourceError::ParserNotConfigured)?;
        debug!("Parsing {:?}", path);
        let output = Command::new(program).args(args).arg(path).output()?;
        if !output.status.success() {
            return Err(SourceError::ParserFailed {
                path: path.display().to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(serde_json::from_slice(&output.stdout)?)
    }

    /// Conventional location of `class`: its package path under the root.
    fn conventional_paths(&self, class: &str) -> Vec<PathBuf> {
        let stem = class.replace('.', "/");
        self.config
            .extensions
            .iter()
            .map(|ext| self.config.root.join(format!("{stem}.{ext}")))
            .collect()
    }

    /// File and model declaring `class`: the conventional path first, then
    /// every test file.
    fn locate_class(&self, class: &str) -> Result<Option<(PathBuf, ClassEntry)>> {
        let conventional = self.conventional_paths(class);
        for path in conventional.iter().filter(|p| p.is_file()) {
            if let Some(entry) = self.model(path)?.class(class) {
                return Ok(Some((path.clone(), entry.clone())));
            }
        }
        for path in self.list_files()? {
            if conventional.contains(&path) {
                continue;
            }
            if let Some(entry) = self.model(&path)?.class(class) {
                return Ok(Some((path, entry.clone())));
            }
        }
        Ok(None)
    }

    fn list_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        collect_sources(&self.config, &self.config.root, &mut files)?;
        files.sort();
        Ok(files)
    }

    fn unit(&self, path: &Path, class: &ClassEntry, method: &MethodEntry) -> CodeUnit {
        CodeUnit {
            id: MethodId::new(&class.name, &method.name),
            path: path.to_path_buf(),
            begin_line: method.begin_line,
            expects_exception: method
                .test_members
                .iter()
                .any(|m| *m == self.config.expected_member),
            declares_throws: method.declares_throws,
            body: method.statements.clone(),
        }
    }

    fn reload(&self, path: &Path, id: &MethodId) -> Result<CodeUnit> {
        let model = self.model(path)?;
        let class = model
            .class(&id.class)
            .ok_or_else(|| SourceError::ClassNotFound(id.class.clone()))?;
        let method = class
            .method(&id.name)
            .ok_or_else(|| SourceError::MethodNotFound(id.qualified()))?;
        Ok(self.unit(path, class, method))
    }

    fn flush_unit(&mut self, unit: &CodeUnit) -> Result<CodeUnit> {
        let model = self.model(&unit.path)?;
        let method = model
            .class(&unit.id.class)
            .and_then(|c| c.method(&unit.id.name))
            .ok_or_else(|| SourceError::MethodNotFound(unit.id.qualified()))?;
        let text = std::fs::read_to_string(&unit.path)?;
        let edited = splice_body(&text, method, &unit.body)?;
        std::fs::write(&unit.path, edited)?;
        self.reload(&unit.path, &unit.id)
    }

    fn add_unit(&mut self, class: &str, name: &str) -> Result<CodeUnit> {
        let (path, entry) = self
            .locate_class(class)?
            .ok_or_else(|| SourceError::ClassNotFound(class.to_string()))?;
        let text = std::fs::read_to_string(&path)?;
        let (edited, line) = insert_method(&text, &entry, &self.config.helper_declaration(name))?;
        std::fs::write(&path, edited)?;
        info!("Added {}.{} at {:?}:{}", class, name, path, line);
        self.reload(&path, &MethodId::new(class, name))
    }
}

fn collect_sources(config: &SourceConfig, dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let hidden = path
            .file_name()
            .is_some_and(|n| n.to_string_lossy().starts_with('.'));
        if hidden {
            continue;
        }
        if path.is_dir() {
            collect_sources(config, &path, files)?;
        } else if config.is_source(&path) {
            files.push(path);
        }
    }
    Ok(())
}

impl ClassHierarchy for FsSourceTree {
    fn superclass(&self, class: &str) -> EngineResult<Option<String>> {
        Ok(self.locate_class(class)?.and_then(|(_, c)| c.superclass))
    }

    fn declared_hooks(&self, class: &str, category: HookCategory) -> EngineResult<Vec<String>> {
        Ok(self
            .locate_class(class)?
            .map(|(_, c)| {
                c.methods
                    .into_iter()
                    .filter(|m| m.hooks.contains(&category))
                    .map(|m| m.name)
                    .collect()
            })
            .unwrap_or_default())
    }

    fn declares_method(&self, class: &str, method: &str) -> EngineResult<bool> {
        Ok(self
            .locate_class(class)?
            .is_some_and(|(_, c)| c.method(method).is_some()))
    }
}

impl SourceTree for FsSourceTree {
    fn test_files(&self) -> EngineResult<Vec<PathBuf>> {
        Ok(self.list_files()?)
    }

    fn find_method(&self, id: &MethodId) -> EngineResult<Option<CodeUnit>> {
        let Some((path, class)) = self.locate_class(&id.class)? else {
            return Ok(None);
        };
        Ok(class.method(&id.name).map(|m| self.unit(&path, &class, m)))
    }

    fn class_file(&self, class: &str) -> EngineResult<Option<PathBuf>> {
        Ok(self.locate_class(class)?.map(|(p, _)| p))
    }

    fn flush(&mut self, unit: &CodeUnit) -> EngineResult<CodeUnit> {
        Ok(self.flush_unit(unit)?)
    }

    fn add_method(&mut self, class: &str, name: &str) -> EngineResult<CodeUnit> {
        Ok(self.add_unit(class, name)?)
    }

    fn read_file(&self, path: &Path) -> EngineResult<Vec<u8>> {
        Ok(std::fs::read(path)?)
    }

    fn write_file(&mut self, path: &Path, bytes: &[u8]) -> EngineResult<()> {
        std::fs::write(path, bytes)?;
        Ok(())
    }
}
