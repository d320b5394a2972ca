use crate::write_queue::{read_optional, write_json_atomic, write_lock_for};
use crate::{InsertOutcome, LabelMap, LabelSink, StoreError};
use aoc_label_core::LabelRecord;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Flat JSON object of session key to label record.
#[derive(Debug, Clone)]
pub struct LabelsFileStore {
    path: PathBuf,
}

impl LabelsFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LabelSink for LabelsFileStore {
    async fn read(&self) -> LabelMap {
        let content = match read_optional(&self.path).await {
            Ok(Some(content)) => content,
            Ok(None) => return LabelMap::new(),
            Err(err) => {
                warn!(event = "label_store_unreadable", path = %self.path.display(), error = %err);
                return LabelMap::new();
            }
        };
        if content.trim().is_empty() {
            return LabelMap::new();
        }
        match serde_json::from_str::<LabelMap>(&content) {
            Ok(labels) => labels,
            Err(err) => {
                warn!(event = "label_store_unreadable", path = %self.path.display(), error = %err);
                LabelMap::new()
            }
        }
    }

    async fn insert_label(
        &self,
        key: &str,
        record: LabelRecord,
        overwrite: bool,
    ) -> Result<InsertOutcome, StoreError> {
        let lock = write_lock_for(&self.path);
        let _guard = lock.lock().await;

        let mut labels = self.read().await;
        if !overwrite {
            if let Some(existing) = labels.get(key) {
                return Ok(InsertOutcome::Existing(existing.clone()));
            }
        }
        labels.insert(key.to_string(), record);
        write_json_atomic(&self.path, &labels).await?;
        Ok(InsertOutcome::Written)
    }
}
