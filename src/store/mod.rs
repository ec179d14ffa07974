//! Flat-file JSON stores for host profiles and app bookmarks.
//!
//! Each store keeps its document in memory behind a lock and rewrites the
//! whole file on every mutation. Writes from concurrent processes are not
//! coordinated.

pub mod apps;
pub mod hosts;

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

use crate::error::RegistryError;

fn io_error(path: &Path, source: std::io::Error) -> RegistryError {
    RegistryError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Reads a document, or `None` when the file does not exist yet.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, RegistryError> {
    let data = match std::fs::read_to_string(path) {
        Ok(d) => d,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_error(path, e)),
    };
    serde_json::from_str(&data)
        .map(Some)
        .map_err(|source| RegistryError::Parse {
            path: path.display().to_string(),
            source,
        })
}

pub(crate) fn write_json<T: Serialize>(path: &Path, doc: &T) -> Result<(), RegistryError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;
    }
    let data = serde_json::to_string_pretty(doc).map_err(|source| RegistryError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    std::fs::write(path, data).map_err(|e| io_error(path, e))
}
