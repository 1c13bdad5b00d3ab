//! Error types for atomic I/O operations

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during inbox operations
#[derive(Error, Debug)]
pub enum InboxError {
    /// Failed to acquire file lock after multiple retries
    #[error("Failed to acquire lock on {path} after {retries} retries")]
    LockTimeout { path: PathBuf, retries: u32 },

    /// Inbox file does not exist
    #[error("Inbox not found: {path}")]
    NotFound { path: PathBuf },

    /// File I/O error
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to parse JSON
    #[error("JSON parse error in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Path cannot be passed to the swap syscall (interior NUL)
    #[error("Invalid inbox path: {path}")]
    InvalidPath { path: PathBuf },
}

impl InboxError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            InboxError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            InboxError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}
