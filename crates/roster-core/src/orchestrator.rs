//! Migration orchestration.
//!
//! A run loads the source snapshot, drops candidates whose key already has
//! a `success` entry in the checkpoint, and pushes the rest through the
//! worker pool. Each candidate reaches exactly one terminal state:
//!
//! | Path                         | Entry written                  |
//! |------------------------------|--------------------------------|
//! | key already succeeded        | none (original entry stands)   |
//! | key missing                  | `failure`, mapping message     |
//! | dry-run                      | `dryRun`                       |
//! | target already has the key   | `skipped`, reason `exists`     |
//! | created                      | `success`                      |
//! | lookup or create failed      | `failure`, sanitized message   |
//!
//! Per-candidate errors never abort the batch. Only setup failures before
//! dispatch are returned as errors.

use crate::checkpoint::{CheckpointLock, CheckpointStore, MigrationResult, MigrationStatus};
use crate::config::{MigrationConfig, MigrationOptions};
use crate::error::Result;
use crate::mapper::{map_user, unique_key};
use crate::pool::WorkerPool;
use crate::record::SourceRecord;
use crate::source::SourceProvider;
use crate::target::{ExistenceChecker, RecordCreator, TargetClient};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Totals for one run. Built only after every unit has finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationSummary {
    /// Documents in the source snapshot.
    pub total: usize,
    /// Candidates that produced a new checkpoint entry this run.
    pub processed: usize,
    pub created: usize,
    pub failed: usize,
    /// Candidates skipped because the target already had them.
    pub skipped: usize,
    /// Candidates skipped because the checkpoint already records success.
    pub already_done: usize,
    pub dry_run: usize,
    /// Per-unit checkpoint writes that failed. The full list is written
    /// again after the join; the run errors if that write fails too.
    pub flush_errors: usize,
    /// Units that died without producing an entry.
    pub aborted: usize,
    pub checkpoint: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl std::fmt::Display for MigrationSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "total={} processed={} created={} failed={} skipped={} already_done={} dry_run={} checkpoint={}",
            self.total,
            self.processed,
            self.created,
            self.failed,
            self.skipped,
            self.already_done,
            self.dry_run,
            self.checkpoint.display()
        )
    }
}

/// What one unit reports back to the pool.
#[derive(Debug, Clone, Copy)]
struct UnitReport {
    status: MigrationStatus,
    flushed: bool,
}

/// Shared, read-only state for every unit of a run.
struct UnitContext {
    checker: ExistenceChecker,
    creator: RecordCreator,
    store: Arc<CheckpointStore>,
    dry_run: bool,
}

impl UnitContext {
    async fn process(&self, index: usize, record: SourceRecord) -> UnitReport {
        let result = self.evaluate(index, &record).await;
        let status = result.status;
        debug!("Candidate {} ({}) -> {}", index, result.uid, status);

        let flushed = match self.store.append_and_flush(result).await {
            Ok(_) => true,
            Err(e) => {
                error!("Failed to flush checkpoint after candidate {}: {}", index, e);
                false
            }
        };
        UnitReport { status, flushed }
    }

    async fn evaluate(&self, index: usize, record: &SourceRecord) -> MigrationResult {
        let email = record.fields.non_blank("email");

        let payload = match map_user(record) {
            Ok(payload) => payload,
            Err(e) => {
                return MigrationResult::failure(index, record.id.clone(), email, e.to_string())
            }
        };

        if self.dry_run {
            return MigrationResult::dry_run(index, payload.uid, email);
        }

        match self.checker.find_by_key(&payload.uid).await {
            Ok(Some(_)) => {
                return MigrationResult::skipped(
                    index,
                    payload.uid,
                    email,
                    MigrationConfig::EXISTS_REASON,
                )
            }
            Ok(None) => {}
            Err(e) => {
                let message = self.creator.sanitize(&e.to_string());
                return MigrationResult::failure(index, payload.uid, email, message);
            }
        }

        match self.creator.create(&payload).await {
            Ok(_) => MigrationResult::success(index, payload.uid, email),
            Err(e) => MigrationResult::failure(index, payload.uid, email, e.message),
        }
    }
}

/// Runs the migration with injected collaborators.
pub struct Migrator {
    source: Arc<dyn SourceProvider>,
    target: Arc<dyn TargetClient>,
    options: MigrationOptions,
    secrets: Vec<String>,
}

impl Migrator {
    pub fn new(
        source: Arc<dyn SourceProvider>,
        target: Arc<dyn TargetClient>,
        options: MigrationOptions,
    ) -> Self {
        Self {
            source,
            target,
            options,
            secrets: Vec::new(),
        }
    }

    /// Redact `secret` from every error message written to the checkpoint.
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secrets.push(secret.into());
        self
    }

    pub fn options(&self) -> &MigrationOptions {
        &self.options
    }

    /// Execute one run and return its summary.
    ///
    /// Errors are returned for failures before dispatch (the checkpoint is
    /// locked, unreadable or unwritable, the source cannot be read, or the
    /// target cannot be reached) and when the checkpoint still cannot be
    /// written once every unit has finished.
    pub async fn run(&self) -> Result<MigrationSummary> {
        let started_at = Utc::now();
        let opts = &self.options;

        let _lock = CheckpointLock::acquire(&opts.checkpoint_path)?;
        let store = Arc::new(CheckpointStore::open(&opts.checkpoint_path)?);

        let records = self.source.fetch_collection(&opts.collection).await?;
        if !opts.dry_run {
            self.target.ping().await?;
        }

        let total = records.len();
        let seen = store.seen_success_keys().await;
        let candidates: Vec<(usize, SourceRecord)> = records
            .into_iter()
            .enumerate()
            .filter(|(_, record)| match unique_key(record) {
                Some(key) => !seen.contains(&key),
                None => true,
            })
            .collect();
        let already_done = total - candidates.len();

        let pool = WorkerPool::new(opts.concurrency, opts.throttle);
        info!(
            "Migrating {} of {} documents from {:?} (width {}, throttle {:?}, dry_run {}, {} already done)",
            candidates.len(),
            total,
            opts.collection,
            pool.width(),
            pool.throttle(),
            opts.dry_run,
            already_done
        );

        let mut creator = RecordCreator::new(self.target.clone());
        for secret in &self.secrets {
            creator = creator.with_secret(secret.clone());
        }
        let context = Arc::new(UnitContext {
            checker: ExistenceChecker::new(self.target.clone()),
            creator,
            store: store.clone(),
            dry_run: opts.dry_run,
        });

        let outcome = pool
            .run(candidates, move |(index, record)| {
                let context = context.clone();
                async move { context.process(index, record).await }
            })
            .await;

        let mut summary = MigrationSummary {
            total,
            processed: outcome.outputs.len(),
            created: 0,
            failed: 0,
            skipped: 0,
            already_done,
            dry_run: 0,
            flush_errors: 0,
            aborted: outcome.panicked,
            checkpoint: store.path().to_path_buf(),
            started_at,
            finished_at: Utc::now(),
        };
        for report in &outcome.outputs {
            match report.status {
                MigrationStatus::Success => summary.created += 1,
                MigrationStatus::Failure => summary.failed += 1,
                MigrationStatus::Skipped => summary.skipped += 1,
                MigrationStatus::DryRun => summary.dry_run += 1,
            }
            if !report.flushed {
                summary.flush_errors += 1;
            }
        }

        if summary.flush_errors > 0 {
            match store.flush().await {
                Ok(count) => warn!(
                    "Checkpoint caught up after {} failed writes ({} entries)",
                    summary.flush_errors, count
                ),
                Err(e) => {
                    error!(
                        "Checkpoint {} could not be written after the run: {}",
                        store.path().display(),
                        e
                    );
                    return Err(e);
                }
            }
        }

        info!("Migration finished: {}", summary);
        Ok(summary)
    }
}
