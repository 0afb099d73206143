//! Exclusive lock over a checkpoint file.
//!
//! Two job processes writing the same checkpoint would each rewrite the file
//! from their own in-memory list and drop the other's entries. The lock is an
//! advisory `flock` on a sibling `.lock` file, held for the whole run.

use crate::error::{MigrationError, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Held for the lifetime of a run. Released on drop.
#[derive(Debug)]
pub struct CheckpointLock {
    file: File,
    path: PathBuf,
}

impl CheckpointLock {
    /// Try to take the lock for `checkpoint_path` without blocking.
    pub fn acquire(checkpoint_path: &Path) -> Result<Self> {
        let path = lock_path(checkpoint_path);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| MigrationError::io_with_path(e, parent))?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| MigrationError::io_with_path(e, &path))?;

        file.try_lock_exclusive().map_err(|_| {
            MigrationError::config(format!(
                "Checkpoint {} is in use by another migration run (lock: {})",
                checkpoint_path.display(),
                path.display()
            ))
        })?;

        debug!("Acquired checkpoint lock {}", path.display());
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CheckpointLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!("Failed to release lock {}: {}", self.path.display(), e);
        }
    }
}

fn lock_path(checkpoint_path: &Path) -> PathBuf {
    let mut name = checkpoint_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    checkpoint_path.with_file_name(name)
}
