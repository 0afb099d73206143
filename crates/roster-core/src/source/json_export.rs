//! Document-store export files as a source.
//!
//! `<dir>/<collection>.json` holds either
//! - an array of documents, each carrying its id in `id` or `_id`, or
//! - an object mapping document id to document fields.
//!
//! Object exports are ordered by document id.

use super::SourceProvider;
use crate::error::{MigrationError, Result};
use crate::record::SourceRecord;
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Reads collection snapshots from an export directory.
#[derive(Debug, Clone)]
pub struct JsonExportSource {
    dir: PathBuf,
}

impl JsonExportSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn collection_path(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{}.json", collection))
    }

    fn parse(path: &Path, contents: &str) -> Result<Vec<SourceRecord>> {
        let value: Value = serde_json::from_str(contents).map_err(|e| MigrationError::Json {
            message: format!("Failed to parse export {}: {}", path.display(), e),
            source: Some(e),
        })?;

        match value {
            Value::Array(items) => Ok(items
                .into_iter()
                .enumerate()
                .map(|(position, item)| {
                    let id = document_id(&item).unwrap_or_else(|| {
                        warn!("Document at position {} has no id", position);
                        format!("#{}", position)
                    });
                    SourceRecord::from_value(id, item)
                })
                .collect()),
            Value::Object(map) => Ok(map
                .into_iter()
                .map(|(id, item)| SourceRecord::from_value(id, item))
                .collect()),
            _ => Err(MigrationError::config(format!(
                "Export {} must be a JSON array or object",
                path.display()
            ))),
        }
    }
}

#[async_trait]
impl SourceProvider for JsonExportSource {
    async fn fetch_collection(&self, collection: &str) -> Result<Vec<SourceRecord>> {
        if !self.dir.is_dir() {
            return Err(MigrationError::config(format!(
                "Source export directory {} does not exist",
                self.dir.display()
            )));
        }
        let path = self.collection_path(collection);
        if !path.is_file() {
            return Err(MigrationError::config(format!(
                "No export for collection {:?} at {}",
                collection,
                path.display()
            )));
        }

        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| MigrationError::io_with_path(e, &path))?;
        let records = Self::parse(&path, &contents)?;
        info!(
            "Loaded {} documents from collection {:?}",
            records.len(),
            collection
        );
        Ok(records)
    }
}

fn document_id(item: &Value) -> Option<String> {
    ["id", "_id"].iter().find_map(|key| match item.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}
