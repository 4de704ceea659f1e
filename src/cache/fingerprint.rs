use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::trace;

use super::error::FileError;

/// Content-derived identity of a file at a point in time
#[derive(Debug, Clone, Eq)]
pub struct Fingerprint {
    pub path: PathBuf,
    /// Lowercase hex SHA256 of the file bytes
    pub content_hash: String,
    pub size_bytes: u64,
    pub modified_at: SystemTime,
}

/// Equal iff the content is byte-identical; path and mtime do not take part
impl PartialEq for Fingerprint {
    fn eq(&self, other: &Self) -> bool {
        self.size_bytes == other.size_bytes && self.content_hash == other.content_hash
    }
}

impl Fingerprint {
    /// Whether `size` and `modified` still describe the file this fingerprint was taken from
    fn matches_metadata(&self, size: u64, modified: SystemTime) -> bool {
        self.size_bytes == size && self.modified_at == modified
    }
}

/// Compute SHA256 of a byte slice as lowercase hex
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Computes fingerprints, skipping the rehash when size and mtime are unchanged.
///
/// The metadata fast path is best effort: a rewrite that keeps both the size
/// and the modification time (coarse timestamp resolution, clock skew) is not
/// detected until one of them changes.
#[derive(Debug, Default)]
pub struct FingerprintEngine {
    known: Mutex<HashMap<PathBuf, Fingerprint>>,
}

impl FingerprintEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fingerprint the file at `path`
    pub fn fingerprint(&self, path: &Path) -> Result<Fingerprint, FileError> {
        let path = canonical(path)?;
        let metadata = fs::metadata(&path).map_err(|e| FileError::from_io(&path, e))?;
        let size = metadata.len();
        let modified = metadata
            .modified()
            .map_err(|e| FileError::from_io(&path, e))?;

        if let Some(known) = self.known.lock().get(&path) {
            if known.matches_metadata(size, modified) {
                trace!(path = %path.display(), "fingerprint fast path");
                return Ok(known.clone());
            }
        }

        let bytes = fs::read(&path).map_err(|e| FileError::from_io(&path, e))?;
        let fingerprint = Fingerprint {
            content_hash: hash_bytes(&bytes),
            // The file may have grown between stat and read; trust what was hashed
            size_bytes: bytes.len() as u64,
            modified_at: modified,
            path: path.clone(),
        };
        trace!(path = %path.display(), hash = %fingerprint.content_hash, "fingerprint rehashed");

        self.known.lock().insert(path, fingerprint.clone());
        Ok(fingerprint)
    }

    /// Drop the remembered fingerprint so the next call rehashes
    pub fn forget(&self, path: &Path) {
        let mut known = self.known.lock();
        if known.remove(path).is_none() {
            if let Ok(path) = path.canonicalize() {
                known.remove(&path);
            }
        }
    }

    pub fn clear(&self) {
        self.known.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.known.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Canonical form of `path`, so `./a.py` and `a.py` share one identity
pub(crate) fn canonical(path: &Path) -> Result<PathBuf, FileError> {
    path.canonicalize().map_err(|e| FileError::from_io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_identical_content_gives_equal_fingerprints() {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("a.py");
        let b = temp_dir.path().join("b.py");
        fs::write(&a, "print('hi')\n").unwrap();
        fs::write(&b, "print('hi')\n").unwrap();

        let engine = FingerprintEngine::new();
        let fa = engine.fingerprint(&a).unwrap();
        let fb = engine.fingerprint(&b).unwrap();

        assert_eq!(fa, fb);
        assert_ne!(fa.path, fb.path);
        assert_eq!(fa.size_bytes, 12);
        assert_eq!(fa.content_hash, hash_bytes(b"print('hi')\n"));
    }

    #[test]
    fn test_appended_content_changes_fingerprint() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.py");
        fs::write(&path, "x = 1\n").unwrap();

        let engine = FingerprintEngine::new();
        let before = engine.fingerprint(&path).unwrap();

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "y = 2").unwrap();
        drop(file);

        let after = engine.fingerprint(&path).unwrap();
        assert_ne!(before, after);
        assert_eq!(after.size_bytes, 12);
    }

    #[test]
    fn test_fast_path_reuses_known_fingerprint() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("lib.rs");
        fs::write(&path, "fn main() {}\n").unwrap();

        let engine = FingerprintEngine::new();
        let first = engine.fingerprint(&path).unwrap();
        let second = engine.fingerprint(&path).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.modified_at, second.modified_at);
        assert_eq!(engine.len(), 1);

        engine.forget(&path);
        assert!(engine.is_empty());
    }

    #[test]
    fn test_relative_and_absolute_paths_share_identity() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("main.go");
        fs::write(&path, "package main\n").unwrap();

        let engine = FingerprintEngine::new();
        let direct = engine.fingerprint(&path).unwrap();
        let dotted = engine
            .fingerprint(&temp_dir.path().join(".").join("main.go"))
            .unwrap();

        assert_eq!(direct.path, dotted.path);
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let engine = FingerprintEngine::new();

        let err = engine
            .fingerprint(&temp_dir.path().join("missing.py"))
            .unwrap_err();
        assert!(matches!(err, FileError::NotFound { .. }));
        assert!(err.path().ends_with("missing.py"));
    }
}
