//! File-backed team and task stores
//!
//! Both stores follow the same read-modify-write discipline as the inbox
//! layer: an advisory lock, a fsynced `.tmp` sibling, then a rename over the
//! target.

mod task;
mod team;

pub use task::{NewTask, TaskStore};
pub use team::TeamStore;

use crate::io::InboxError;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised by the team and task stores
#[derive(Debug, Error)]
pub enum StoreError {
    /// Team, member or task does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// File I/O error
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Stored document could not be parsed
    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Lock could not be acquired
    #[error("Lock failed: {0}")]
    Lock(#[from] InboxError),

    /// Task id is not a positive decimal integer
    #[error("Invalid task id: {0:?}")]
    InvalidId(String),
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(
    path: &Path,
    missing: impl FnOnce() -> String,
) -> Result<T, StoreError> {
    let content = match std::fs::read(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StoreError::NotFound(missing()));
        }
        Err(e) => return Err(StoreError::io(path, e)),
    };
    serde_json::from_slice(&content).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let tmp_path = path.with_extension("tmp");
    let content = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    {
        let mut file = std::fs::File::create(&tmp_path).map_err(|e| StoreError::io(&tmp_path, e))?;
        file.write_all(&content)
            .map_err(|e| StoreError::io(&tmp_path, e))?;
        file.sync_all().map_err(|e| StoreError::io(&tmp_path, e))?;
    }

    std::fs::rename(&tmp_path, path).map_err(|e| StoreError::io(path, e))
}

fn remove_dir_if_present(dir: &Path) -> Result<(), StoreError> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StoreError::io(dir, e)),
    }
}
