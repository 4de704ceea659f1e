use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::types::Tier;

/// Failure to observe a file while fingerprinting it
#[derive(Error, Debug)]
pub enum FileError {
    #[error("File not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Permission denied: {}", path.display())]
    PermissionDenied { path: PathBuf },

    #[error("Unreadable file {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FileError {
    /// Classify an I/O error raised while touching `path`
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        let path = path.to_path_buf();
        match err.kind() {
            io::ErrorKind::NotFound => FileError::NotFound { path },
            io::ErrorKind::PermissionDenied => FileError::PermissionDenied { path },
            _ => FileError::Unreadable { path, source: err },
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            FileError::NotFound { path }
            | FileError::PermissionDenied { path }
            | FileError::Unreadable { path, .. } => path,
        }
    }
}

/// Invalid tier configuration, detected when the coordinator is built
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Tier '{tier}' must allow at least one entry")]
    ZeroCapacity { tier: Tier },

    #[error("Tier '{tier}' has a zero TTL; omit the TTL to disable expiry")]
    ZeroTtl { tier: Tier },
}
