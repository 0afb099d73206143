//! Checkpoint persistence for resumable migration runs.
//!
//! The checkpoint is a JSON array of [`MigrationResult`] entries, one per
//! processed candidate across all runs. Every append rewrites the whole file
//! atomically, so the file on disk is always a complete, valid snapshot.

use super::atomic::{atomic_read_json, atomic_write_json, preserve_corrupt};
use crate::error::{MigrationError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Terminal status of one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MigrationStatus {
    Success,
    Skipped,
    Failure,
    DryRun,
}

impl MigrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationStatus::Success => "success",
            MigrationStatus::Skipped => "skipped",
            MigrationStatus::Failure => "failure",
            MigrationStatus::DryRun => "dryRun",
        }
    }
}

impl std::fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one candidate in one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationResult {
    /// Position of the candidate in the source snapshot.
    pub index: usize,
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub status: MigrationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MigrationResult {
    fn new(
        index: usize,
        uid: impl Into<String>,
        email: Option<String>,
        status: MigrationStatus,
    ) -> Self {
        Self {
            index,
            uid: uid.into(),
            email: email.filter(|e| !e.is_empty()),
            status,
            reason: None,
            error: None,
        }
    }

    pub fn success(index: usize, uid: impl Into<String>, email: Option<String>) -> Self {
        Self::new(index, uid, email, MigrationStatus::Success)
    }

    pub fn skipped(
        index: usize,
        uid: impl Into<String>,
        email: Option<String>,
        reason: impl Into<String>,
    ) -> Self {
        let mut result = Self::new(index, uid, email, MigrationStatus::Skipped);
        result.reason = Some(reason.into());
        result
    }

    pub fn failure(
        index: usize,
        uid: impl Into<String>,
        email: Option<String>,
        error: impl Into<String>,
    ) -> Self {
        let mut result = Self::new(index, uid, email, MigrationStatus::Failure);
        result.error = Some(error.into());
        result
    }

    pub fn dry_run(index: usize, uid: impl Into<String>, email: Option<String>) -> Self {
        Self::new(index, uid, email, MigrationStatus::DryRun)
    }
}

/// Unique keys that already have a `success` entry.
pub fn seen_success_keys(entries: &[MigrationResult]) -> HashSet<String> {
    entries
        .iter()
        .filter(|e| e.status == MigrationStatus::Success)
        .map(|e| e.uid.clone())
        .collect()
}

/// Load a checkpoint file.
///
/// A missing or unparsable file reads as an empty list. An unparsable file
/// is copied aside first so the next flush does not destroy it. A file that
/// exists but cannot be read is a configuration error.
pub fn load(path: &Path) -> Result<Vec<MigrationResult>> {
    match atomic_read_json::<Vec<MigrationResult>>(path) {
        Ok(Some(entries)) => Ok(entries),
        Ok(None) => Ok(Vec::new()),
        Err(MigrationError::Json { message, .. }) => {
            warn!(
                "Checkpoint at {} is unparsable, starting fresh: {}",
                path.display(),
                message
            );
            if let Some(backup) = preserve_corrupt(path) {
                warn!("Previous checkpoint preserved at {}", backup.display());
            }
            Ok(Vec::new())
        }
        Err(e) => Err(MigrationError::config(format!(
            "Checkpoint {} cannot be read: {}",
            path.display(),
            e
        ))),
    }
}

/// Shared, append-only checkpoint.
///
/// All appends go through one mutex; at most one flush is in flight.
pub struct CheckpointStore {
    path: PathBuf,
    entries: Mutex<Vec<MigrationResult>>,
}

impl CheckpointStore {
    /// Open the checkpoint at `path`, creating an empty one if absent.
    ///
    /// The loaded list is written back once, so a checkpoint that cannot be
    /// written fails here rather than after records reach the target.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = load(&path)?;
        atomic_write_json(&path, &entries).map_err(|e| {
            MigrationError::config(format!(
                "Checkpoint {} is not writable: {}",
                path.display(),
                e
            ))
        })?;
        info!(
            "Opened checkpoint {} with {} entries",
            path.display(),
            entries.len()
        );
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy of the current in-memory list.
    pub async fn snapshot(&self) -> Vec<MigrationResult> {
        self.entries.lock().await.clone()
    }

    pub async fn seen_success_keys(&self) -> HashSet<String> {
        seen_success_keys(&self.entries.lock().await)
    }

    /// Append one result and rewrite the file. Returns the new entry count.
    ///
    /// The entry stays in memory even if the write fails; the next
    /// successful flush persists it.
    pub async fn append_and_flush(&self, result: MigrationResult) -> Result<usize> {
        let mut entries = self.entries.lock().await;
        entries.push(result);
        atomic_write_json(&self.path, &*entries)?;
        debug!("Checkpoint flushed ({} entries)", entries.len());
        Ok(entries.len())
    }

    /// Rewrite the file from the in-memory list. Returns the entry count.
    pub async fn flush(&self) -> Result<usize> {
        let entries = self.entries.lock().await;
        atomic_write_json(&self.path, &*entries)?;
        Ok(entries.len())
    }
}

/// Status counts over a checkpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointReport {
    pub entries: usize,
    pub unique_keys: usize,
    /// Count of raw entries per status.
    pub by_status: BTreeMap<MigrationStatus, usize>,
    /// Count of keys per their most recent status, where a key that ever
    /// succeeded counts as success.
    pub latest_by_status: BTreeMap<MigrationStatus, usize>,
}

impl CheckpointReport {
    pub fn from_entries(entries: &[MigrationResult]) -> Self {
        let mut by_status = BTreeMap::new();
        let mut latest: BTreeMap<&str, MigrationStatus> = BTreeMap::new();

        for entry in entries {
            *by_status.entry(entry.status).or_insert(0) += 1;
            let slot = latest.entry(entry.uid.as_str()).or_insert(entry.status);
            if *slot != MigrationStatus::Success {
                *slot = entry.status;
            }
        }

        let mut latest_by_status = BTreeMap::new();
        for status in latest.values() {
            *latest_by_status.entry(*status).or_insert(0) += 1;
        }

        Self {
            entries: entries.len(),
            unique_keys: latest.len(),
            by_status,
            latest_by_status,
        }
    }

    pub fn count(&self, status: MigrationStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }

    pub fn latest(&self, status: MigrationStatus) -> usize {
        self.latest_by_status.get(&status).copied().unwrap_or(0)
    }
}
