//! Human-readable patch artifacts.
//!
//! Layout:
//!
//! ```text
//! STATUS: INLINE SUCCESSFUL
//! MODIFIED: a.VTest.victim
//! MODIFIED FILE: src/test/a/VTest.java
//! POLLUTER: a.PTest.polluter
//! POLLUTER FILE: src/test/a/PTest.java
//! ORIGINAL CLEANER SIZE: 4
//! NEW CLEANER SIZE: 1
//! ELAPSED TIME: 12.5
//! ==========================
//! @@ -13,0 +13,3 @@
//! + {
//! +     b();
//! + }
//! ```
//!
//! The separator and hunk appear only when there is a block to show.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

use crate::domain::NO_CANDIDATE;
use crate::metrics::METRICS;
use crate::source::CodeUnit;
use crate::statement::{render_block, statements_size, Statement};

pub const PATCH_LINE_SEP: &str = "==========================";
pub const PATCH_EXTENSION: &str = "patch";

/// Everything that goes into one patch artifact.
#[derive(Debug, Clone, Default)]
pub struct PatchArtifact<'a> {
    pub status: &'a str,
    pub modified: Option<&'a CodeUnit>,
    pub polluter: Option<&'a CodeUnit>,
    /// Size of the un-minimized candidate (0 prints as N/A).
    pub original_size: usize,
    pub block: Option<&'a [Statement]>,
    /// Line the hunk is anchored at.
    pub begin: usize,
    pub elapsed_secs: f64,
}

impl PatchArtifact<'_> {
    pub fn render(&self) -> Vec<String> {
        let name = |unit: Option<&CodeUnit>| {
            unit.map_or_else(|| NO_CANDIDATE.to_string(), |u| u.id.qualified())
        };
        let file = |unit: Option<&CodeUnit>| {
            unit.map_or_else(|| NO_CANDIDATE.to_string(), |u| u.path.display().to_string())
        };

        let mut lines = vec![
            format!("STATUS: {}", self.status),
            format!("MODIFIED: {}", name(self.modified)),
            format!("MODIFIED FILE: {}", file(self.modified)),
            format!("POLLUTER: {}", name(self.polluter)),
            format!("POLLUTER FILE: {}", file(self.polluter)),
            format!(
                "ORIGINAL CLEANER SIZE: {}",
                match self.original_size {
                    0 => NO_CANDIDATE.to_string(),
                    n => n.to_string(),
                }
            ),
            format!(
                "NEW CLEANER SIZE: {}",
                self.block
                    .map_or_else(|| NO_CANDIDATE.to_string(), |b| statements_size(b).to_string())
            ),
            format!("ELAPSED TIME: {}", self.elapsed_secs),
        ];

        if let Some(block) = self.block {
            let hunk = render_block(block, 0);
            lines.push(PATCH_LINE_SEP.to_string());
            lines.push(format!(
                "@@ -{},0 +{},{} @@",
                self.begin,
                self.begin,
                hunk.len()
            ));
            lines.extend(hunk.into_iter().map(|l| format!("+ {l}")));
        }
        lines
    }
}

/// First free path among `<dir>/<victim>.patch`, `<dir>/<victim>.patch.1`, ...
pub fn unique_patch_path(dir: &Path, victim: &str) -> PathBuf {
    let base = dir.join(format!("{victim}.{PATCH_EXTENSION}"));
    if !base.exists() {
        return base;
    }
    (1..)
        .map(|n| PathBuf::from(format!("{}.{n}", base.display())))
        .find(|p| !p.exists())
        .unwrap_or(base)
}

/// Write `artifact` for `victim` under `dir`, never overwriting an earlier one.
pub fn write_patch(dir: &Path, victim: &str, artifact: &PatchArtifact<'_>) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("create {:?}", dir))?;
    let path = unique_patch_path(dir, victim);

    let mut content = artifact.render().join("\n");
    content.push('\n');

    let mut tmp = NamedTempFile::new_in(dir).with_context(|| format!("temp file in {:?}", dir))?;
    tmp.write_all(content.as_bytes()).context("write patch")?;
    tmp.persist_noclobber(&path)
        .map_err(|e| e.error)
        .with_context(|| format!("persist {:?}", path))?;

    METRICS.inc_patches_written();
    Ok(path)
}
