//! On-disk persistence of per-victim results.
//!
//! Layout under the results directory:
//!
//! - `<victim>.json`: pretty-printed [`AggregateResult`]
//! - `<victim>.digest`: SHA-256 hex of the JSON bytes

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::domain::{AggregateResult, OdfixError, Result};

/// SHA-256 hex digest of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Writes and reads [`AggregateResult`]s, one file pair per victim.
#[derive(Debug, Clone)]
pub struct ResultStore {
    dir: PathBuf,
}

impl ResultStore {
    /// Open a store rooted at `dir`, creating it if needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn json_path(&self, victim: &str) -> PathBuf {
        self.dir.join(format!("{victim}.json"))
    }

    fn digest_path(&self, victim: &str) -> PathBuf {
        self.dir.join(format!("{victim}.digest"))
    }

    /// Persist `result`, replacing any earlier result for the same victim.
    pub fn save(&self, result: &AggregateResult) -> Result<PathBuf> {
        let json = serde_json::to_vec_pretty(result)?;
        let digest = sha256_hex(&json);

        let path = self.json_path(&result.victim);
        self.write_atomic(&path, &json)?;
        self.write_atomic(&self.digest_path(&result.victim), digest.as_bytes())?;
        Ok(path)
    }

    /// Read the result for `victim`, verifying its digest.
    pub fn load(&self, victim: &str) -> Result<AggregateResult> {
        let json = fs::read(self.json_path(victim))?;
        let expected = fs::read_to_string(self.digest_path(victim))?;
        let actual = sha256_hex(&json);
        if expected.trim() != actual {
            return Err(OdfixError::DigestMismatch {
                expected: expected.trim().to_string(),
                actual,
            });
        }
        Ok(serde_json::from_slice(&json)?)
    }

    /// Victims with a saved result, sorted.
    pub fn victims(&self) -> Result<Vec<String>> {
        let mut victims = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                victims.push(stem.to_string());
            }
        }
        victims.sort();
        Ok(victims)
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(bytes)?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OperationTime, PatchRecord, Status};

    fn result(victim: &str) -> AggregateResult {
        AggregateResult::from_records(
            OperationTime::instantaneous(),
            victim,
            vec![PatchRecord::early(Status::CleanerFail, victim, Some("a.PTest.p"))],
        )
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ResultStore::open(dir.path().join("polluter")).expect("open");
        let saved = result("a.VTest.victim");
        let path = store.save(&saved).expect("save");
        assert!(path.ends_with("a.VTest.victim.json"));
        assert_eq!(store.load("a.VTest.victim").expect("load"), saved);
        assert_eq!(store.victims().expect("list"), vec!["a.VTest.victim"]);
    }

    #[test]
    fn test_tampered_result_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ResultStore::open(dir.path()).expect("open");
        let path = store.save(&result("a.VTest.victim")).expect("save");
        let mut json = fs::read_to_string(&path).expect("read");
        json = json.replace("CLEANER_FAIL", "FIX_INLINE");
        fs::write(&path, json).expect("write");
        assert!(matches!(
            store.load("a.VTest.victim"),
            Err(OdfixError::DigestMismatch { .. })
        ));
    }

    #[test]
    fn test_save_overwrites() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ResultStore::open(dir.path()).expect("open");
        store.save(&result("a.VTest.victim")).expect("save");
        let mut newer = result("a.VTest.victim");
        newer.status = Status::FixInline;
        store.save(&newer).expect("save");
        assert_eq!(store.load("a.VTest.victim").expect("load").status, Status::FixInline);
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
