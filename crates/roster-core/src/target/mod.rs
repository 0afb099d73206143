//! Target record store access.
//!
//! The engine consumes exactly two remote operations: find-by-uid and
//! create. [`TargetClient`] is the seam; [`RestTargetClient`] talks to a
//! headless CMS over HTTP and tests substitute in-memory fakes.

mod checker;
mod creator;
mod rest;

pub use checker::ExistenceChecker;
pub use creator::{prune_unset, RecordCreator};
pub use rest::{RestTargetClient, RestTargetConfig};

use crate::error::TargetError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A record already present on the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingRecord {
    pub id: String,
    pub uid: String,
}

/// A record the target just created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedRecord {
    pub id: String,
}

/// Remote operations the migration needs from the target system.
#[async_trait]
pub trait TargetClient: Send + Sync {
    /// Cheap reachability check, run once before dispatch.
    async fn ping(&self) -> Result<(), TargetError>;

    /// Look up a record by its unique key.
    async fn find_by_uid(&self, uid: &str) -> Result<Option<ExistingRecord>, TargetError>;

    /// Create a record from an already-serialized payload.
    async fn create_user(&self, payload: &Value) -> Result<CreatedRecord, TargetError>;
}
