//! Stage artifact persistence.
//!
//! Each stage writes exactly one artifact: a pretty-printed JSON array of
//! records. Writes are all-or-nothing — the array is serialized to a temp
//! file in the target directory and renamed over the destination, so a
//! crash mid-write never leaves a truncated artifact. Artifacts are fully
//! overwritten per run; there is no mid-loop checkpointing.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::records::ProblemRecord;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error for {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Write a record array to `path`, creating parent directories as needed.
pub fn write_artifact(path: &Path, records: &[ProblemRecord]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }

    let json = serde_json::to_string_pretty(records).map_err(|source| StorageError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, json).map_err(io_err(&tmp_path))?;
    fs::rename(&tmp_path, path).map_err(io_err(path))?;

    info!(path = %path.display(), records = records.len(), "Wrote stage artifact");
    Ok(())
}

/// Read a record array back from `path`.
pub fn read_artifact(path: &Path) -> Result<Vec<ProblemRecord>, StorageError> {
    let contents = fs::read_to_string(path).map_err(io_err(path))?;
    serde_json::from_str(&contents).map_err(|source| StorageError::Json {
        path: path.to_path_buf(),
        source,
    })
}
