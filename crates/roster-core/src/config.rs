//! Centralized configuration for the migration job.
//!
//! Constants follow the `struct XConfig; impl XConfig { const .. }` layout.
//! Per-run choices live in [`MigrationOptions`].

use std::path::PathBuf;
use std::time::Duration;

/// Migration engine defaults and limits.
pub struct MigrationConfig;

impl MigrationConfig {
    pub const DEFAULT_COLLECTION: &'static str = "users";
    pub const DEFAULT_CHECKPOINT_FILE: &'static str = "migration-results.json";
    pub const DEFAULT_CONCURRENCY: usize = 3;
    pub const MIN_CONCURRENCY: usize = 1;
    pub const MAX_CONCURRENCY: usize = 5;
    pub const DEFAULT_THROTTLE: Duration = Duration::from_millis(1000);
    /// Reason recorded when the target already holds the record.
    pub const EXISTS_REASON: &'static str = "exists";
}

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
    pub const USER_AGENT: &'static str = "roster-migrate/0.1";
    pub const DEFAULT_TARGET_COLLECTION: &'static str = "school-users";
    /// Upper bound on error text persisted into the checkpoint.
    pub const MAX_ERROR_MESSAGE_CHARS: usize = 300;
}

/// Options for a single migration run.
#[derive(Debug, Clone)]
pub struct MigrationOptions {
    /// Source collection to read.
    pub collection: String,
    /// Requested worker width. Clamped by the pool.
    pub concurrency: usize,
    /// Compute and record outcomes without creating anything.
    pub dry_run: bool,
    pub checkpoint_path: PathBuf,
    /// Delay a worker slot is held after each unit.
    pub throttle: Duration,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            collection: MigrationConfig::DEFAULT_COLLECTION.to_string(),
            concurrency: MigrationConfig::DEFAULT_CONCURRENCY,
            dry_run: false,
            checkpoint_path: PathBuf::from(MigrationConfig::DEFAULT_CHECKPOINT_FILE),
            throttle: MigrationConfig::DEFAULT_THROTTLE,
        }
    }
}

impl MigrationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_checkpoint_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.checkpoint_path = path.into();
        self
    }

    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = MigrationOptions::default();
        assert_eq!(opts.collection, "users");
        assert_eq!(opts.concurrency, 3);
        assert!(!opts.dry_run);
        assert_eq!(opts.checkpoint_path, PathBuf::from("migration-results.json"));
        assert_eq!(opts.throttle, Duration::from_secs(1));
    }

    #[test]
    fn test_builder_overrides() {
        let opts = MigrationOptions::new()
            .with_collection("staff")
            .with_concurrency(9)
            .with_dry_run(true)
            .with_throttle(Duration::ZERO);
        assert_eq!(opts.collection, "staff");
        assert_eq!(opts.concurrency, 9);
        assert!(opts.dry_run);
        assert_eq!(opts.throttle, Duration::ZERO);
    }

    #[test]
    fn test_limits_are_ordered() {
        assert!(MigrationConfig::MIN_CONCURRENCY <= MigrationConfig::DEFAULT_CONCURRENCY);
        assert!(MigrationConfig::DEFAULT_CONCURRENCY <= MigrationConfig::MAX_CONCURRENCY);
    }
}
