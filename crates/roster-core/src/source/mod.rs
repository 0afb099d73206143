//! Source document store access.
//!
//! The engine reads one collection in full at the start of a run and works
//! on that in-memory snapshot.

mod json_export;

pub use json_export::JsonExportSource;

use crate::error::Result;
use crate::record::SourceRecord;
use async_trait::async_trait;

/// Bulk reader over a document store.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Every document in `collection`, in store order.
    async fn fetch_collection(&self, collection: &str) -> Result<Vec<SourceRecord>>;
}
