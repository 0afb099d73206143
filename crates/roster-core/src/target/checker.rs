//! Existence checks against the target.

use super::{ExistingRecord, TargetClient};
use crate::error::TargetError;
use std::sync::Arc;
use tracing::debug;

/// Read-only lookup guarding against duplicate creation when the
/// checkpoint was lost but the target kept the record.
#[derive(Clone)]
pub struct ExistenceChecker {
    client: Arc<dyn TargetClient>,
}

impl ExistenceChecker {
    pub fn new(client: Arc<dyn TargetClient>) -> Self {
        Self { client }
    }

    pub async fn find_by_key(&self, uid: &str) -> Result<Option<ExistingRecord>, TargetError> {
        let found = self.client.find_by_uid(uid).await?;
        if let Some(ref record) = found {
            debug!("{} already exists on target as {}", uid, record.id);
        }
        Ok(found)
    }
}
