//! Roster Core - resumable bulk migration of school roster records.
//!
//! Copies user documents from a document-store export into a target record
//! store behind a rate-limited REST API. Runs are resumable: every outcome is
//! written to a JSON checkpoint, and keys that already succeeded are never
//! sent again.
//!
//! # Example
//!
//! ```rust,ignore
//! use roster_core::{JsonExportSource, MigrationOptions, Migrator, RestTargetClient, RestTargetConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> roster_core::Result<()> {
//!     let source = Arc::new(JsonExportSource::new("./export"));
//!     let target = Arc::new(RestTargetClient::new(RestTargetConfig::new("http://localhost:1337"))?);
//!     let options = MigrationOptions::new().with_concurrency(3);
//!
//!     let summary = Migrator::new(source, target, options).run().await?;
//!     println!("{}", summary);
//!     Ok(())
//! }
//! ```

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod mapper;
pub mod orchestrator;
pub mod pool;
pub mod record;
pub mod source;
pub mod target;

// Re-export commonly used types
pub use checkpoint::{CheckpointReport, CheckpointStore, MigrationResult, MigrationStatus};
pub use config::{MigrationConfig, MigrationOptions, NetworkConfig};
pub use error::{CreationError, MappingError, MigrationError, Result, TargetError};
pub use mapper::{map_user, LearningMode, Role, UserPayload};
pub use orchestrator::{MigrationSummary, Migrator};
pub use pool::{clamp_width, WorkerPool};
pub use record::{RawRecord, SourceRecord};
pub use source::{JsonExportSource, SourceProvider};
pub use target::{
    CreatedRecord, ExistenceChecker, ExistingRecord, RecordCreator, RestTargetClient,
    RestTargetConfig, TargetClient,
};
