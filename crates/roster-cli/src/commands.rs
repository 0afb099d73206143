//! Subcommand implementations.

use anyhow::{Context, Result};
use clap::Args;
use roster_core::checkpoint::{self, CheckpointReport};
use roster_core::{
    JsonExportSource, MigrationConfig, MigrationOptions, MigrationStatus, Migrator, NetworkConfig,
    RestTargetClient, RestTargetConfig,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Source collection to migrate
    #[arg(long, default_value = MigrationConfig::DEFAULT_COLLECTION)]
    pub collection: String,

    /// Concurrent workers (clamped to 1..=5)
    #[arg(short, long, default_value_t = MigrationConfig::DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Record what would happen without creating anything
    #[arg(long)]
    pub dry_run: bool,

    /// Checkpoint file
    #[arg(long, default_value = MigrationConfig::DEFAULT_CHECKPOINT_FILE)]
    pub checkpoint: PathBuf,

    /// Delay each worker slot is held after a record, in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub throttle_ms: u64,

    /// Directory holding `<collection>.json` exports
    #[arg(long, env = "ROSTER_SOURCE_DIR", default_value = "./export")]
    pub source_dir: PathBuf,

    /// Base URL of the target CMS
    #[arg(long, env = "ROSTER_TARGET_URL")]
    pub target_url: String,

    /// API token for the target CMS
    #[arg(long, env = "ROSTER_TARGET_TOKEN", hide_env_values = true)]
    pub target_token: Option<String>,

    /// Target collection endpoint name
    #[arg(long, default_value = NetworkConfig::DEFAULT_TARGET_COLLECTION)]
    pub target_collection: String,

    /// Global cap on target requests per second
    #[arg(long)]
    pub max_rps: Option<u32>,
}

#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Checkpoint file
    #[arg(long, default_value = MigrationConfig::DEFAULT_CHECKPOINT_FILE)]
    pub checkpoint: PathBuf,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: RunArgs) -> Result<()> {
    let source = Arc::new(JsonExportSource::new(&args.source_dir));

    let target_config = RestTargetConfig::new(&args.target_url)
        .with_collection(&args.target_collection)
        .with_api_token(args.target_token.clone())
        .with_max_requests_per_second(args.max_rps);
    let target = Arc::new(
        RestTargetClient::new(target_config).context("Failed to configure target client")?,
    );
    info!("Target endpoint: {}", target.endpoint());

    let options = MigrationOptions::new()
        .with_collection(&args.collection)
        .with_concurrency(args.concurrency)
        .with_dry_run(args.dry_run)
        .with_checkpoint_path(&args.checkpoint)
        .with_throttle(Duration::from_millis(args.throttle_ms));

    let mut migrator = Migrator::new(source, target, options);
    if let Some(token) = args.target_token.filter(|t| !t.is_empty()) {
        migrator = migrator.with_secret(token);
    }

    let summary = migrator.run().await.context("Migration could not run")?;

    // Summary goes to stdout, logs to stderr.
    println!("Migration complete: {}", summary);
    Ok(())
}

pub fn report(args: ReportArgs) -> Result<()> {
    if !args.checkpoint.exists() {
        anyhow::bail!("Checkpoint {} does not exist", args.checkpoint.display());
    }
    let entries = checkpoint::load(&args.checkpoint)?;
    let report = CheckpointReport::from_entries(&entries);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{}: {} entries, {} keys",
        args.checkpoint.display(),
        report.entries,
        report.unique_keys
    );
    for status in [
        MigrationStatus::Success,
        MigrationStatus::Skipped,
        MigrationStatus::Failure,
        MigrationStatus::DryRun,
    ] {
        println!(
            "  {:<8} entries={:<6} keys={}",
            status.as_str(),
            report.count(status),
            report.latest(status)
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use roster_core::MigrationResult;
    use tempfile::TempDir;

    #[test]
    fn test_report_missing_checkpoint_fails() {
        let dir = TempDir::new().unwrap();
        let result = report(ReportArgs {
            checkpoint: dir.path().join("missing.json"),
            json: false,
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_report_reads_checkpoint() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("migration-results.json");
        checkpoint::atomic_write_json(
            &path,
            &vec![
                MigrationResult::success(0, "a", None),
                MigrationResult::failure(1, "b", None, "boom"),
            ],
        )
        .unwrap();

        assert!(report(ReportArgs {
            checkpoint: path.clone(),
            json: false,
        })
        .is_ok());
        assert!(report(ReportArgs {
            checkpoint: path,
            json: true,
        })
        .is_ok());
    }

    #[tokio::test]
    async fn test_run_with_missing_export_fails_before_dispatch() {
        let dir = TempDir::new().unwrap();
        let checkpoint_path = dir.path().join("migration-results.json");
        let result = run(RunArgs {
            collection: "users".into(),
            concurrency: 3,
            dry_run: true,
            checkpoint: checkpoint_path.clone(),
            throttle_ms: 0,
            source_dir: dir.path().join("no-export"),
            target_url: "http://127.0.0.1:9".into(),
            target_token: None,
            target_collection: "school-users".into(),
            max_rps: None,
        })
        .await;
        assert!(result.is_err());
        assert!(checkpoint::load(&checkpoint_path).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_from_export_directory() {
        let dir = TempDir::new().unwrap();
        let export = dir.path().join("export");
        std::fs::create_dir_all(&export).unwrap();
        std::fs::write(
            export.join("users.json"),
            r#"[{"id": "d1", "uid": "u-1", "learningMode": "online"}, {"id": "d2"}]"#,
        )
        .unwrap();
        let checkpoint_path = dir.path().join("migration-results.json");

        run(RunArgs {
            collection: "users".into(),
            concurrency: 2,
            dry_run: true,
            checkpoint: checkpoint_path.clone(),
            throttle_ms: 0,
            source_dir: export,
            target_url: "http://127.0.0.1:9".into(),
            target_token: None,
            target_collection: "school-users".into(),
            max_rps: None,
        })
        .await
        .unwrap();

        let entries = checkpoint::load(&checkpoint_path).unwrap();
        assert_eq!(entries.len(), 2);
        let dry = entries.iter().find(|e| e.uid == "u-1").unwrap();
        assert_eq!(dry.status, MigrationStatus::DryRun);
        let missing = entries.iter().find(|e| e.uid == "d2").unwrap();
        assert_eq!(missing.status, MigrationStatus::Failure);
    }
}
