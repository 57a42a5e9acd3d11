use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::domain::snapshot::{Snapshot, SnapshotError};

#[derive(Debug, Error)]
pub enum SnapshotFileError {
    #[error("snapshot file {path} could not be accessed: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("snapshot file {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("snapshot file {path} has an unexpected layout: {source}")]
    Layout {
        path: PathBuf,
        #[source]
        source: SnapshotError,
    },
}

/// Replaces whatever was at `path` with the full snapshot.
pub fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<(), SnapshotFileError> {
    let io_error = |source| SnapshotFileError::Io {
        path: path.to_path_buf(),
        source,
    };

    let value = snapshot.to_json().map_err(|source| SnapshotFileError::Layout {
        path: path.to_path_buf(),
        source,
    })?;
    let content = serde_json::to_string_pretty(&value).map_err(|source| SnapshotFileError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(io_error)?;
    }
    fs::write(path, content).map_err(io_error)
}

/// `Ok(None)` when no snapshot has been written yet.
pub fn read_snapshot(path: &Path) -> Result<Option<Snapshot>, SnapshotFileError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(SnapshotFileError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let value = serde_json::from_str(&content).map_err(|source| SnapshotFileError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    Snapshot::from_json(value)
        .map(Some)
        .map_err(|source| SnapshotFileError::Layout {
            path: path.to_path_buf(),
            source,
        })
}
