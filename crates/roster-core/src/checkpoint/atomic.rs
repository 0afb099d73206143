//! Atomic JSON persistence.
//!
//! Writes go to a temp file with a PID+thread suffix, are fsynced, then
//! renamed over the target. A reader never observes a partial file.

use crate::error::{MigrationError, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use std::thread;
use tracing::{debug, warn};

/// Parse `path` as JSON. A missing file is `Ok(None)`.
///
/// Returns `None` if the file doesn't exist, or an error if reading or
/// parsing fails.
pub fn atomic_read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }

    let contents =
        fs::read_to_string(path).map_err(|e| MigrationError::io_with_path(e, path))?;

    let data: T = serde_json::from_str(&contents).map_err(|e| MigrationError::Json {
        message: format!("Failed to parse {}: {}", path.display(), e),
        source: Some(e),
    })?;

    Ok(Some(data))
}

/// Replace `path` with the pretty-printed JSON of `data`.
///
/// 1. Serialize (pretty) and re-parse to validate
/// 2. Write to a unique temp file and fsync
/// 3. Rename over the target
pub fn atomic_write_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| MigrationError::io_with_path(e, parent))?;
        }
    }

    let temp_path = temp_path_for(path);

    let serialized = serde_json::to_string_pretty(data).map_err(|e| MigrationError::Json {
        message: format!("Could not serialize {}: {}", path.display(), e),
        source: Some(e),
    })?;

    serde_json::from_str::<serde_json::Value>(&serialized).map_err(|e| MigrationError::Json {
        message: format!("Serialized JSON did not re-parse: {}", e),
        source: Some(e),
    })?;

    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|e| MigrationError::io_with_path(e, &temp_path))?;

        file.write_all(serialized.as_bytes())
            .and_then(|_| file.flush())
            .and_then(|_| file.sync_all())
            .map_err(|e| {
                let _ = fs::remove_file(&temp_path);
                MigrationError::io_with_path(e, &temp_path)
            })?;
    }

    if let Err(e) = fs::rename(&temp_path, path) {
        warn!(
            "Failed to rename {} to {}: {}",
            temp_path.display(),
            path.display(),
            e
        );
        let _ = fs::remove_file(&temp_path);
        return Err(MigrationError::io_with_path(e, path));
    }

    debug!("Replaced {}", path.display());
    Ok(())
}

/// Copy an unreadable file aside so a later write does not destroy it.
///
/// Returns the backup path on success.
pub fn preserve_corrupt(path: &Path) -> Option<PathBuf> {
    let backup = path.with_extension("json.corrupt");
    match fs::copy(path, &backup) {
        Ok(_) => Some(backup),
        Err(e) => {
            warn!("Failed to preserve {}: {}", path.display(), e);
            None
        }
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let pid = process::id();
    let tid = thread_id();
    path.with_extension(format!("json.{}.{}.tmp", pid, tid))
}

/// Hash of the current thread id, used to keep temp names distinct.
fn thread_id() -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    format!("{:?}", thread::current().id()).hash(&mut hasher);
    hasher.finish()
}
